use std::process::ExitCode;

use fugu::{application, gfx};

mod bootstrap_state;
mod logging;

fn get_version() -> u32 {
    let mut version_numbers = env!("CARGO_PKG_VERSION")
        .split('.')
        .flat_map(|value| value.parse::<u32>());
    let mut next = || version_numbers.next().unwrap_or(0);

    fugu::ash::vk::make_api_version(0, next(), next(), next())
}

fn log_error_chain(err: &dyn std::error::Error) {
    log::error!("{err}");
    let mut source = err.source();
    while let Some(cause) = source {
        log::error!("\tcaused by: {cause}");
        source = cause.source();
    }
}

fn main() -> ExitCode {
    let _logger_handle = match logging::init() {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("failed to set up logging: {err}");
            return ExitCode::FAILURE;
        }
    };

    let app_info = application::WindowCreationData {
        title: "vulkay".to_owned(),
        width: 1280,
        height: 720,
    };
    let context_info = gfx::context::ContextCreateInfo {
        application_name: c"vulkay".to_owned(),
        application_version: get_version(),
        shader_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/shader").into(),
        ..Default::default()
    };
    let state = bootstrap_state::BootstrapState::default();
    let app = application::Application::build(app_info, context_info, Box::new(state));

    match app.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log_error_chain(&err);
            ExitCode::FAILURE
        }
    }
}
