use std::{collections::BTreeMap, fmt, io, sync::Arc};

use crate::lua::LuaError;

#[derive(Debug, Clone)]
pub struct VisError {
    pub key: &'static str,
    pub args: BTreeMap<&'static str, String>,
    pub causes: Vec<VisCause>,
}

#[derive(Debug, Clone)]
pub enum VisCause {
    Vis(Box<VisError>),
    Std(Arc<dyn std::error::Error + Send + Sync>),
}

impl VisError {
    pub fn new(key: &'static str) -> Self {
        Self {
            key,
            args: BTreeMap::new(),
            causes: Vec::new(),
        }
    }

    pub fn with_arg(mut self, k: &'static str, v: impl ToString) -> Self {
        self.args.insert(k, v.to_string());
        self
    }

    pub fn push_vis(mut self, cause: VisError) -> Self {
        self.causes.push(VisCause::Vis(Box::new(cause)));
        self
    }

    pub fn push_std(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.causes.push(VisCause::Std(Arc::new(cause)));
        self
    }

    /// Value of a named argument, mostly useful when matching on errors in tests.
    pub fn arg(&self, k: &str) -> Option<&str> {
        self.args.get(k).map(String::as_str)
    }
}

impl fmt::Display for VisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.key)?;
        let mut first = true;
        for (k, v) in &self.args {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{k}={v}")?;
        }
        write!(f, ")")?;
        for cause in &self.causes {
            match cause {
                VisCause::Vis(e) => write!(f, ": {e}")?,
                VisCause::Std(e) => write!(f, ": {e}")?,
            }
        }
        Ok(())
    }
}

impl std::error::Error for VisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.causes.iter().find_map(|c| match c {
            VisCause::Vis(e) => Some(e.as_ref() as &dyn std::error::Error),
            VisCause::Std(e) => Some(e.as_ref() as &(dyn std::error::Error + 'static)),
        })
    }
}

impl From<String> for VisError {
    fn from(s: String) -> Self {
        VisError::new("string-error").with_arg("msg", s)
    }
}

impl From<&str> for VisError {
    fn from(s: &str) -> Self {
        VisError::new("str-error").with_arg("msg", s)
    }
}

impl From<io::Error> for VisError {
    fn from(err: io::Error) -> Self {
        VisError::new("io-error").push_std(err)
    }
}

impl From<LuaError> for VisError {
    fn from(err: LuaError) -> Self {
        VisError::new("lua-error").push_std(err)
    }
}

impl From<tobj::LoadError> for VisError {
    fn from(err: tobj::LoadError) -> Self {
        VisError::new("tobj::LoadError").push_std(err)
    }
}

impl From<wgpu::CreateSurfaceError> for VisError {
    fn from(err: wgpu::CreateSurfaceError) -> Self {
        VisError::new("wgpu::CreateSurfaceError").push_std(err)
    }
}

impl From<winit::error::EventLoopError> for VisError {
    fn from(err: winit::error::EventLoopError) -> Self {
        VisError::new("winit::error::EventLoopError").push_std(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_args_in_key_order_then_causes() {
        let err = VisError::new("unknown-parent")
            .with_arg("parent", "thigh")
            .with_arg("frame", "shank")
            .push_vis(VisError::new("inner"));
        assert_eq!(
            err.to_string(),
            "unknown-parent(frame=shank, parent=thigh): inner()"
        );
        assert_eq!(err.arg("parent"), Some("thigh"));
    }

    #[test]
    fn io_errors_are_exposed_as_source() {
        let err: VisError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.key, "io-error");
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "gone");
    }
}
