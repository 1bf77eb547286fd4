use std::error;
use std::fmt;

// Build-time errors. These surface from `Scene::build`/`BvhNode::build` before
// any ray is cast; the render path itself never returns an error.

#[derive(Debug)]
pub enum ConfigError {
    ZeroDimension { width: u32, height: u32 },
    ZeroSamples,
    ZeroDepth,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::ZeroDimension { width, height } => write!(
                f,
                "render config requires width > 0 and height > 0, got {}x{}",
                width, height
            ),
            ConfigError::ZeroSamples => {
                write!(f, "render config requires samples_per_pixel >= 1")
            }
            ConfigError::ZeroDepth => write!(f, "render config requires max_depth >= 1"),
        }
    }
}
impl error::Error for ConfigError {}

#[derive(Debug)]
pub struct GeometryError(pub String);

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl error::Error for GeometryError {}

#[derive(Debug)]
pub enum BuildError {
    Config(ConfigError),
    Geometry(GeometryError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BuildError::Config(e) => e.fmt(f),
            BuildError::Geometry(e) => e.fmt(f),
        }
    }
}
impl error::Error for BuildError {}

impl From<ConfigError> for BuildError {
    fn from(e: ConfigError) -> Self {
        BuildError::Config(e)
    }
}
impl From<GeometryError> for BuildError {
    fn from(e: GeometryError) -> Self {
        BuildError::Geometry(e)
    }
}

// Not a failure: the render path returns this alongside a partial image when
// the caller's cancel flag was observed between tiles.
#[derive(Debug)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "render was cancelled before completion")
    }
}
impl error::Error for Cancelled {}
