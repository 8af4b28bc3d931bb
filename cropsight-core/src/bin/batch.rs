use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cropsight_core::{
    config::BatchArgs,
    inference::{
        classify::{ClsSession, YoloCls},
        detect::{Yolo, YoloSession},
        model::session_builder,
    },
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = BatchArgs::parse();
    let job = args.job();
    let runner = args.pipeline.runner()?;

    // listing first so a missing dataset fails before any model is loaded
    let images = runner.list_images(&job)?;
    info!("Found {} images in {}", images.len(), runner.dataset_dir(&job).display());

    let models_dir = &args.pipeline.models_dir;
    let mut detector = YoloSession::new(session_builder()?, Yolo::new(job.family, models_dir))?;
    let mut classifier = ClsSession::new(session_builder()?, YoloCls::new(models_dir))?;

    let reports = runner.run(&job, &images, &mut detector, &mut classifier)?;

    let output = if args.pretty {
        serde_json::to_string_pretty(&reports)?
    } else {
        serde_json::to_string(&reports)?
    };
    println!("{output}");

    Ok(())
}
