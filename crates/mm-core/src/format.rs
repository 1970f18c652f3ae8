use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::error::CoreError;

/// Mesh file formats the artifact store can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    #[default]
    Obj,
    Ply,
    Stl,
    Glb,
}

impl OutputFormat {
    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Obj => "obj",
            Self::Ply => "ply",
            Self::Stl => "stl",
            Self::Glb => "glb",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Obj => "model/obj",
            Self::Ply => "application/octet-stream",
            Self::Stl => "model/stl",
            Self::Glb => "model/gltf-binary",
        }
    }

    /// Whether the format can carry per-vertex color
    pub fn supports_vertex_colors(&self) -> bool {
        !matches!(self, Self::Stl)
    }

    pub fn all() -> [OutputFormat; 4] {
        [Self::Obj, Self::Ply, Self::Stl, Self::Glb]
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "obj" => Ok(Self::Obj),
            "ply" => Ok(Self::Ply),
            "stl" => Ok(Self::Stl),
            "glb" => Ok(Self::Glb),
            _ => Err(CoreError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(value: OutputFormat) -> Self {
        value.extension().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_formats() {
        assert_eq!("obj".parse::<OutputFormat>().unwrap(), OutputFormat::Obj);
        assert_eq!(" .GLB ".parse::<OutputFormat>().unwrap(), OutputFormat::Glb);
        for format in OutputFormat::all() {
            assert_eq!(format.extension().parse::<OutputFormat>().unwrap(), format);
        }
    }

    #[test]
    fn test_unsupported_format_is_explicit() {
        let err = "fbx".parse::<OutputFormat>().unwrap_err();
        assert_eq!(err, CoreError::UnsupportedFormat("fbx".into()));
        assert!(err.to_string().contains("unsupported format"));
    }

    #[test]
    fn test_serde_uses_extension_strings() {
        let json = serde_json::to_string(&OutputFormat::Stl).unwrap();
        assert_eq!(json, "\"stl\"");
        let parsed: OutputFormat = serde_json::from_str("\"ply\"").unwrap();
        assert_eq!(parsed, OutputFormat::Ply);
        assert!(serde_json::from_str::<OutputFormat>("\"dae\"").is_err());
    }
}
