use anyhow::Result;
use core_lighting::{App, DemoConfig};
use winit::event_loop::EventLoop;

fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let config = DemoConfig::from_args(std::env::args().skip(1))?;
  log::info!(
    "Starting core lighting demo: model={}, window={}x{}, vsync={}",
    config.model_path.display(),
    config.window_width,
    config.window_height,
    config.vsync
  );

  let event_loop = EventLoop::new()?;
  let mut app = App::new(&event_loop, config)?;
  event_loop.run_app(&mut app)?;

  if let Some(error) = app.take_error() {
    return Err(error);
  }

  log::info!("Graceful shutdown");
  Ok(())
}
