use anyhow::Context;
use winit::event_loop::{ControlFlow, EventLoop};

use rbvis::app::AppHandler;
use rbvis::cli::{CliArgs, USAGE, scene_dump};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = CliArgs::parse(std::env::args().skip(1)).context(USAGE)?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    if args.dump_scene {
        println!("{}", scene_dump(&args)?);
        return Ok(());
    }

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut handler = AppHandler::new(
        args.model,
        args.animation,
        tokio::runtime::Runtime::new()?,
    );

    event_loop.run_app(&mut handler)?;

    Ok(())
}
