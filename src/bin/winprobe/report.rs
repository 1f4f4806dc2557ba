// ── JSON reports ──────────────────────────────────────────────────────────────
//
// Output shapes that do not map one-to-one onto a library type.  Library
// types that already derive `Serialize` (process and module entries,
// `MonitorInfo`, `ShortcutInfo`, …) are printed as they are.

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProbeError {
    #[error(transparent)]
    Win(#[from] winhandle::Error),

    #[error("JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) type Result<T> = std::result::Result<T, ProbeError>;

/// Render `value` as pretty JSON, or on one line when `compact`.
pub(crate) fn render<T: Serialize + ?Sized>(value: &T, compact: bool) -> Result<String> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(text)
}

/// A known folder that may not exist on this machine.
#[derive(Debug, Serialize)]
pub(crate) struct FolderReport {
    pub(crate) folder: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

impl FolderReport {
    pub(crate) fn new<E: std::fmt::Display>(
        folder: &'static str,
        path: std::result::Result<std::path::PathBuf, E>,
    ) -> Self {
        match path {
            Ok(p) => Self {
                folder,
                path: Some(p.display().to_string()),
                error: None,
            },
            Err(e) => Self {
                folder,
                path: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct Size {
    pub(crate) width: i32,
    pub(crate) height: i32,
}

impl From<(i32, i32)> for Size {
    fn from((width, height): (i32, i32)) -> Self {
        Self { width, height }
    }
}

/// Icons stored in an executable or icon file.
#[derive(Debug, Serialize)]
pub(crate) struct IconReport {
    pub(crate) path: String,
    pub(crate) count: u32,
    /// Explorer's type name for the file.
    pub(crate) type_name: String,
    /// Size of the first large icon, if any.
    pub(crate) large: Option<Size>,
    pub(crate) small: Option<Size>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EnvReport {
    pub(crate) name: String,
    /// `None` when the variable is not set.
    pub(crate) value: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenReport {
    pub(crate) opened: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_output_is_one_line() {
        let r = EnvReport {
            name: "PATH".to_owned(),
            value: None,
        };
        let text = render(&r, true).unwrap();
        assert_eq!(text, r#"{"name":"PATH","value":null}"#);
        assert!(render(&r, false).unwrap().contains('\n'));
    }

    #[test]
    fn folder_report_keeps_only_the_outcome() {
        let ok = FolderReport::new::<String>("Windows", Ok("C:\\Windows".into()));
        assert_eq!(
            render(&ok, true).unwrap(),
            r#"{"folder":"Windows","path":"C:\\Windows"}"#
        );
        let err = FolderReport::new("Downloads", Err::<std::path::PathBuf, _>("not found"));
        assert_eq!(
            render(&err, true).unwrap(),
            r#"{"folder":"Downloads","error":"not found"}"#
        );
    }

    #[test]
    fn icon_sizes_serialize_as_objects() {
        let r = IconReport {
            path: "x.exe".to_owned(),
            count: 1,
            type_name: "Application".to_owned(),
            large: Some((32, 32).into()),
            small: None,
        };
        let v: serde_json::Value = serde_json::from_str(&render(&r, true).unwrap()).unwrap();
        assert_eq!(v["large"]["width"], 32);
        assert!(v["small"].is_null());
    }
}
