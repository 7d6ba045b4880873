//! The 3D figure collaborator, reached only through an explicitly owned context.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::colors::Rgba;
use crate::error::PocketResult;

pub trait RenderContext {
    fn load_structure(&mut self, path: &Path, label: &str) -> PocketResult<()>;
    fn show_pockets(&mut self, colors: &BTreeMap<u32, Rgba>) -> PocketResult<()>;
    fn save_figure(&mut self, path: &Path) -> PocketResult<()>;
    /// Clear the scene.
    fn reset(&mut self);
}

/// Exclusive use of a render context; the scene is reset when the session drops.
pub struct RenderSession<'a> {
    ctx: &'a mut dyn RenderContext,
}

impl<'a> RenderSession<'a> {
    pub fn open(ctx: &'a mut dyn RenderContext) -> Self {
        Self { ctx }
    }

    pub fn load_structure(&mut self, path: &Path, label: &str) -> PocketResult<()> {
        self.ctx.load_structure(path, label)
    }

    pub fn show_pockets(&mut self, colors: &BTreeMap<u32, Rgba>) -> PocketResult<()> {
        self.ctx.show_pockets(colors)
    }

    pub fn save_figure(&mut self, path: &Path) -> PocketResult<()> {
        self.ctx.save_figure(path)
    }
}

impl Drop for RenderSession<'_> {
    fn drop(&mut self) {
        self.ctx.reset();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    Load(PathBuf),
    Show(Vec<u32>),
    Save(PathBuf),
    Reset,
}

/// Records scene operations as log events; draws nothing.
#[derive(Debug, Default)]
pub struct LoggingRenderer {
    pub calls: Vec<RenderCall>,
    loaded: Option<String>,
}

impl RenderContext for LoggingRenderer {
    fn load_structure(&mut self, path: &Path, label: &str) -> PocketResult<()> {
        info!("render: load {} as {}", path.display(), label);
        self.loaded = Some(label.to_string());
        self.calls.push(RenderCall::Load(path.to_path_buf()));
        Ok(())
    }

    fn show_pockets(&mut self, colors: &BTreeMap<u32, Rgba>) -> PocketResult<()> {
        info!(
            "render: colour {} pockets on {}",
            colors.len(),
            self.loaded.as_deref().unwrap_or("<empty scene>")
        );
        self.calls.push(RenderCall::Show(colors.keys().copied().collect()));
        Ok(())
    }

    fn save_figure(&mut self, path: &Path) -> PocketResult<()> {
        info!("render: figure {}", path.display());
        self.calls.push(RenderCall::Save(path.to_path_buf()));
        Ok(())
    }

    fn reset(&mut self) {
        self.loaded = None;
        self.calls.push(RenderCall::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PocketError;

    fn failing_step(renderer: &mut LoggingRenderer) -> PocketResult<()> {
        let mut session = RenderSession::open(renderer);
        session.load_structure(Path::new("a.pdb"), "a")?;
        Err(PocketError::config("stop", "early return"))
    }

    #[test]
    fn session_resets_on_drop() {
        let mut renderer = LoggingRenderer::default();
        {
            let mut session = RenderSession::open(&mut renderer);
            session.load_structure(Path::new("x.pdb"), "x").unwrap();
            session.show_pockets(&BTreeMap::from([(1, [1.0; 4])])).unwrap();
            session.save_figure(Path::new("x_3D.png")).unwrap();
        }
        assert_eq!(renderer.calls.last(), Some(&RenderCall::Reset));
        assert_eq!(renderer.calls.len(), 4);
    }

    #[test]
    fn early_return_still_resets() {
        let mut renderer = LoggingRenderer::default();
        assert!(failing_step(&mut renderer).is_err());
        assert_eq!(renderer.calls, vec![RenderCall::Load(PathBuf::from("a.pdb")), RenderCall::Reset]);
    }
}
