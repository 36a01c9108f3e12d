//! 适配器选择与设备能力检查
//!
//! 适配器枚举本身由后端完成（DXGI），这里只处理与平台无关的部分：
//! 选择策略、终端交互和能力校验。

use std::io::{BufRead, Write};

use crate::core::config::GraphicsConfig;
use crate::core::error::{GraphicsError, MeshRenderError, Result};

/// 适配器描述
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterInfo {
    /// DXGI 枚举顺序中的索引
    pub index: u32,
    pub description: String,
    /// 软件适配器（WARP / Basic Render Driver）
    pub is_software: bool,
    pub dedicated_video_memory: u64,
}

/// 适配器选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterSelection {
    /// 第一个硬件适配器
    FirstHardware,
    /// 指定索引
    Index(u32),
    /// 在终端中列出适配器并读取用户输入
    Interactive,
}

impl AdapterSelection {
    pub fn from_config(config: &GraphicsConfig) -> Self {
        if config.interactive_adapter {
            AdapterSelection::Interactive
        } else if let Some(index) = config.adapter {
            AdapterSelection::Index(index)
        } else {
            AdapterSelection::FirstHardware
        }
    }
}

/// 按策略选择适配器，返回在 `adapters` 中的位置
///
/// 交互模式下从 `input` 读取选择，无效输入会重新提示。
pub fn select_adapter<R: BufRead, W: Write>(
    adapters: &[AdapterInfo],
    selection: AdapterSelection,
    input: &mut R,
    output: &mut W,
) -> Result<usize> {
    let hardware = || adapters.iter().position(|a| !a.is_software);

    let chosen = match selection {
        AdapterSelection::FirstHardware => hardware().ok_or_else(|| {
            GraphicsError::DeviceCreation("No hardware adapter found".to_string())
        })?,
        AdapterSelection::Index(index) => {
            let position = adapters
                .iter()
                .position(|a| a.index == index)
                .ok_or_else(|| {
                    GraphicsError::DeviceCreation(format!(
                        "Adapter {} does not exist ({} adapters found)",
                        index,
                        adapters.len()
                    ))
                })?;
            if adapters[position].is_software {
                return Err(GraphicsError::DeviceCreation(format!(
                    "Adapter {} ({}) is a software adapter",
                    index, adapters[position].description
                ))
                .into());
            }
            position
        }
        AdapterSelection::Interactive => prompt_adapter(adapters, input, output)?,
    };

    tracing::info!(
        index = adapters[chosen].index,
        adapter = %adapters[chosen].description,
        vram_mb = adapters[chosen].dedicated_video_memory / (1024 * 1024),
        "Adapter selected"
    );
    Ok(chosen)
}

/// 列出适配器并读取用户选择
///
/// 输入无效时提示重新输入，没有次数限制；输入流结束是致命错误。
pub fn prompt_adapter<R: BufRead, W: Write>(
    adapters: &[AdapterInfo],
    input: &mut R,
    output: &mut W,
) -> Result<usize> {
    let candidates: Vec<usize> = (0..adapters.len()).filter(|&i| !adapters[i].is_software).collect();
    if candidates.is_empty() {
        return Err(GraphicsError::DeviceCreation("No hardware adapter found".to_string()).into());
    }

    writeln!(output, "Adapters found:")?;
    for &i in &candidates {
        writeln!(output, "{}: {}", adapters[i].index, adapters[i].description)?;
    }
    write!(output, "Which adapter should be used? ")?;
    output.flush()?;

    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(MeshRenderError::Initialization(
                "Standard input closed before an adapter was chosen".to_string(),
            ));
        }

        let choice = line.trim();
        let position = choice
            .parse::<u32>()
            .ok()
            .and_then(|index| candidates.iter().copied().find(|&i| adapters[i].index == index));

        match position {
            Some(position) => return Ok(position),
            None => {
                write!(output, "Choice {} seems wrong. Try again: ", choice)?;
                output.flush()?;
            }
        }
    }
}

/// 设备能力
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// (major, minor)，例如 (12, 1)
    pub feature_level: (u32, u32),
    /// (major, minor)，例如 (6, 5)
    pub shader_model: (u32, u32),
    /// 0 表示不支持网格着色器
    pub mesh_shader_tier: u32,
}

impl DeviceCapabilities {
    pub const MIN_FEATURE_LEVEL: (u32, u32) = (12, 1);
    pub const MIN_SHADER_MODEL: (u32, u32) = (6, 5);

    /// 检查最低要求，不满足时返回致命错误
    pub fn validate(&self) -> Result<()> {
        if self.feature_level < Self::MIN_FEATURE_LEVEL {
            return Err(GraphicsError::UnsupportedHardware(format!(
                "Feature level {}.{} is below the required {}.{}",
                self.feature_level.0,
                self.feature_level.1,
                Self::MIN_FEATURE_LEVEL.0,
                Self::MIN_FEATURE_LEVEL.1
            ))
            .into());
        }

        if self.shader_model < Self::MIN_SHADER_MODEL {
            return Err(GraphicsError::UnsupportedHardware(format!(
                "Shader Model {}.{} is not supported, {}.{} is required",
                self.shader_model.0,
                self.shader_model.1,
                Self::MIN_SHADER_MODEL.0,
                Self::MIN_SHADER_MODEL.1
            ))
            .into());
        }

        if self.mesh_shader_tier == 0 {
            return Err(GraphicsError::UnsupportedHardware(
                "Mesh Shaders aren't supported".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn adapters() -> Vec<AdapterInfo> {
        vec![
            AdapterInfo {
                index: 0,
                description: "Discrete GPU".to_string(),
                is_software: false,
                dedicated_video_memory: 8 << 30,
            },
            AdapterInfo {
                index: 1,
                description: "Integrated GPU".to_string(),
                is_software: false,
                dedicated_video_memory: 512 << 20,
            },
            AdapterInfo {
                index: 2,
                description: "Microsoft Basic Render Driver".to_string(),
                is_software: true,
                dedicated_video_memory: 0,
            },
        ]
    }

    fn select(selection: AdapterSelection, input: &str) -> (Result<usize>, String) {
        let mut output = Vec::new();
        let result = select_adapter(&adapters(), selection, &mut Cursor::new(input), &mut output);
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_first_hardware() {
        let (result, output) = select(AdapterSelection::FirstHardware, "");
        assert_eq!(result.unwrap(), 0);
        assert!(output.is_empty());
    }

    #[test]
    fn test_software_only_fails() {
        let software = vec![adapters().remove(2)];
        let result = select_adapter(&software, AdapterSelection::FirstHardware, &mut Cursor::new(""), &mut Vec::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_configured_index() {
        assert_eq!(select(AdapterSelection::Index(1), "").0.unwrap(), 1);
        assert!(select(AdapterSelection::Index(7), "").0.is_err());
        assert!(select(AdapterSelection::Index(2), "").0.is_err());
    }

    #[test]
    fn test_interactive_reprompts() {
        let (result, output) = select(AdapterSelection::Interactive, "abc\n9\n2\n1\n");
        assert_eq!(result.unwrap(), 1);

        assert!(output.starts_with("Adapters found:\n0: Discrete GPU\n1: Integrated GPU\n"));
        assert!(!output.contains("Basic Render Driver"));
        assert!(output.contains("Choice abc seems wrong. Try again: "));
        assert!(output.contains("Choice 9 seems wrong. Try again: "));
        assert_eq!(output.matches("seems wrong").count(), 3);
    }

    #[test]
    fn test_interactive_eof_is_fatal() {
        let (result, _) = select(AdapterSelection::Interactive, "x\n");
        assert!(matches!(result, Err(MeshRenderError::Initialization(_))));
    }

    #[test]
    fn test_selection_from_config() {
        let mut config = GraphicsConfig::default();
        assert_eq!(AdapterSelection::from_config(&config), AdapterSelection::FirstHardware);

        config.adapter = Some(3);
        assert_eq!(AdapterSelection::from_config(&config), AdapterSelection::Index(3));

        config.interactive_adapter = true;
        assert_eq!(AdapterSelection::from_config(&config), AdapterSelection::Interactive);
    }

    #[test]
    fn test_capabilities() {
        let caps = DeviceCapabilities {
            feature_level: (12, 1),
            shader_model: (6, 5),
            mesh_shader_tier: 1,
        };
        assert!(caps.validate().is_ok());

        let old = DeviceCapabilities { feature_level: (12, 0), ..caps };
        assert!(old.validate().is_err());

        let sm = DeviceCapabilities { shader_model: (6, 4), ..caps };
        assert!(sm.validate().is_err());

        let no_mesh = DeviceCapabilities { mesh_shader_tier: 0, ..caps };
        let err = no_mesh.validate().unwrap_err();
        assert!(err.to_string().contains("Mesh Shaders"));
    }
}
