use thiserror::Error;

use crate::gfx::context::{Context, ContextCreateError, ContextCreateInfo};

#[derive(Debug, Clone)]
pub struct WindowCreationData {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl From<WindowCreationData> for winit::window::WindowAttributes {
    fn from(value: WindowCreationData) -> Self {
        Self::default()
            .with_title(value.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(value.width, value.height))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    Exit,
}

pub type StateError = Box<dyn std::error::Error + Send + Sync>;

pub trait ApplicationState {
    /// Called once, right after the context is bootstrapped.
    fn on_attach(&mut self, context: &mut Context) -> Result<ControlFlow, StateError>;

    /// Called on every redraw until it returns [`ControlFlow::Exit`].
    fn update(&mut self, context: &mut Context) -> Result<ControlFlow, StateError>;
}

pub struct Application {
    window_creation_data: WindowCreationData,
    context_create_info: ContextCreateInfo,

    // the context owns the surface, it has to go before the window
    context: Option<Context>,
    window: Option<winit::window::Window>,

    state: Box<dyn ApplicationState>,
    error: Option<ApplicationError>,
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("event loop creation failed")]
    EventLoopCreationFail(winit::error::EventLoopError),

    #[error("application run failed")]
    ApplicationRunFail(winit::error::EventLoopError),

    #[error("window creation failed")]
    WindowCreationFail(#[from] winit::error::OsError),

    #[error("context creation failed")]
    ContextCreationFail(#[from] ContextCreateError),

    #[error("application state failed")]
    StateFail(StateError),
}

impl Application {
    pub fn build(
        create_data: WindowCreationData,
        context_create_info: ContextCreateInfo,
        start_state: Box<dyn ApplicationState>,
    ) -> Self {
        Self {
            window_creation_data: create_data,
            context_create_info,
            context: None,
            window: None,
            state: start_state,
            error: None,
        }
    }

    pub fn run(mut self) -> Result<(), ApplicationError> {
        let event_loop = winit::event_loop::EventLoop::new()
            .map_err(ApplicationError::EventLoopCreationFail)?;

        event_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);
        event_loop
            .run_app(&mut self)
            .map_err(ApplicationError::ApplicationRunFail)?;

        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn attach(
        &mut self,
        event_loop: &winit::event_loop::ActiveEventLoop,
    ) -> Result<ControlFlow, ApplicationError> {
        let window = event_loop.create_window(self.window_creation_data.clone().into())?;
        let mut context = Context::new(&window, &self.context_create_info)?;
        let flow = self
            .state
            .on_attach(&mut context)
            .map_err(ApplicationError::StateFail)?;

        window.request_redraw();
        self.context = Some(context);
        self.window = Some(window);

        Ok(flow)
    }

    fn shutdown(
        &mut self,
        event_loop: &winit::event_loop::ActiveEventLoop,
        error: Option<ApplicationError>,
    ) {
        if let Some(err) = &error {
            log::error!("{err}");
        }
        if self.error.is_none() {
            self.error = error;
        }

        self.context = None;
        self.window = None;
        event_loop.exit();
    }
}

impl winit::application::ApplicationHandler for Application {
    fn resumed(&mut self, event_loop: &winit::event_loop::ActiveEventLoop) {
        if self.context.is_some() {
            return;
        }

        match self.attach(event_loop) {
            Ok(ControlFlow::Continue) => (),
            Ok(ControlFlow::Exit) => self.shutdown(event_loop, None),
            Err(e) => self.shutdown(event_loop, Some(e)),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &winit::event_loop::ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: winit::event::WindowEvent,
    ) {
        match event {
            winit::event::WindowEvent::CloseRequested => {
                self.shutdown(event_loop, None);
            }
            winit::event::WindowEvent::RedrawRequested => {
                let Some(context) = self.context.as_mut() else {
                    return;
                };

                match self.state.update(context) {
                    Ok(ControlFlow::Continue) => {
                        if let Some(window) = &self.window {
                            window.request_redraw();
                        }
                    }
                    Ok(ControlFlow::Exit) => self.shutdown(event_loop, None),
                    Err(e) => self.shutdown(event_loop, Some(ApplicationError::StateFail(e))),
                }
            }

            _ => (),
        }
    }
}
