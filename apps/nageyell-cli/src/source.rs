use async_trait::async_trait;
use nageyell_camera::{CameraMetrics, FrameSource, ScriptedCamera, StillImageCamera};
use nageyell_types::{
    config::CameraConfig,
    frame::{Facing, Frame},
    Result,
};
use nageyell_vision::fixtures::try_qr_frame;
use tracing::{info, warn};

/// Frame source picked at startup from flags and config.
pub enum CliCamera {
    Still(StillImageCamera),
    Scripted(ScriptedCamera),
}

impl CliCamera {
    pub fn from_config(config: &CameraConfig, demo_credential: Option<&str>) -> Result<Self> {
        if let Some(credential) = demo_credential {
            info!("Scanning a rendered QR code instead of a camera");
            let frames = vec![Frame::blank(64, 64, 255), try_qr_frame(credential)?];
            let camera = ScriptedCamera::new()
                .with_frames(Facing::Environment, frames.clone())
                .with_frames(Facing::User, frames);
            return Ok(Self::Scripted(camera));
        }
        Ok(match &config.still_dir {
            Some(dir) => Self::Still(StillImageCamera::new(dir)),
            None => {
                warn!("No camera.still_dir configured and no demo credential given; nothing to scan");
                Self::Scripted(ScriptedCamera::new())
            }
        })
    }
}

#[async_trait]
impl FrameSource for CliCamera {
    async fn open(&mut self, facing: Facing) -> Result<()> {
        match self {
            Self::Still(camera) => camera.open(facing).await,
            Self::Scripted(camera) => camera.open(facing).await,
        }
    }

    async fn frame(&mut self) -> Result<Option<Frame>> {
        match self {
            Self::Still(camera) => camera.frame().await,
            Self::Scripted(camera) => camera.frame().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Still(camera) => camera.close().await,
            Self::Scripted(camera) => camera.close().await,
        }
    }

    fn is_open(&self) -> bool {
        match self {
            Self::Still(camera) => camera.is_open(),
            Self::Scripted(camera) => camera.is_open(),
        }
    }

    fn metrics(&self) -> CameraMetrics {
        match self {
            Self::Still(camera) => camera.metrics(),
            Self::Scripted(camera) => camera.metrics(),
        }
    }
}
