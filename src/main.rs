use std::sync::Arc;

use iced::widget::{button, column, container, progress_bar, text, Column};
use iced::{Alignment, Element, Length, Task, Theme};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use piroplasma::config::SampleSettings;
use piroplasma::download::{DownloadCoordinator, DownloadEvent, Progress, ReqwestClient};
use piroplasma::state::data::ImagePayload;
use piroplasma::state::layers::{LayerHost, LayerStack};
use piroplasma::{make_sample_data, platform_coordinator, SampleData, SampleError};

/// Main application state
struct Viewer {
    /// Sample provider; `None` if the cache or HTTP client could not be set up
    coordinator: Option<DownloadCoordinator<ReqwestClient>>,
    /// Layers currently on display
    layers: LayerStack,
    /// Rendered top layer
    preview: Option<iced::widget::image::Handle>,
    /// Last tick of a running download
    progress: Option<Progress>,
    /// A download or its decode is still running
    downloading: bool,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// User clicked the "Open Sample Image" button
    OpenSample,
    /// Background download reported progress, completion or failure
    Download(DownloadEvent),
    /// Downloaded sample finished decoding off the UI thread
    Loaded(Result<ImagePayload, Arc<SampleError>>),
}

impl Viewer {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let setup = SampleSettings::load_default()
            .map_err(SampleError::from)
            .and_then(platform_coordinator);

        let (coordinator, status) = match setup {
            Ok(coordinator) => {
                info!(cache = %coordinator.locator().root().display(), "viewer ready");
                (Some(coordinator), "Ready.".to_string())
            }
            Err(err) => {
                error!(%err, "sample provider unavailable");
                (None, format!("Sample data unavailable: {}", err))
            }
        };

        (
            Viewer {
                coordinator,
                layers: LayerStack::new(),
                preview: None,
                progress: None,
                downloading: false,
                status,
            },
            Task::none(),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::OpenSample => {
                let Some(coordinator) = &self.coordinator else {
                    return Task::none();
                };
                if self.downloading {
                    return Task::none();
                }

                match make_sample_data(coordinator) {
                    Ok(SampleData::Loaded(payload)) => {
                        for layer in payload {
                            self.layers.add_layer(layer);
                        }
                        self.status = "Loaded sample from cache.".to_string();
                        self.refresh_preview();
                        Task::none()
                    }
                    Ok(SampleData::Downloading(pending)) => {
                        for layer in pending.placeholder {
                            self.layers.add_layer(layer);
                        }
                        self.status = "Downloading sample image...".to_string();
                        self.downloading = true;
                        self.refresh_preview();

                        // Runs on iced's executor; events come back through update()
                        Task::run(pending.task.into_events(), Message::Download)
                    }
                    Err(err) => {
                        error!(%err, "failed to open sample");
                        self.status = format!("Failed to open sample: {}", err);
                        Task::none()
                    }
                }
            }
            Message::Download(DownloadEvent::Progress(progress)) => {
                self.status = format!(
                    "{} {}/{}",
                    progress.description, progress.current, progress.total
                );
                self.progress = Some(progress);
                Task::none()
            }
            Message::Download(DownloadEvent::Completed(done)) => {
                self.progress = None;
                let Some(coordinator) = &self.coordinator else {
                    return Task::none();
                };

                let installed = coordinator.install(&mut self.layers, &done);
                self.refresh_preview();
                match installed {
                    Ok(loader) => {
                        self.status = "Decoding sample image...".to_string();
                        Task::perform(loader.load_async(), |result| {
                            Message::Loaded(result.map_err(Arc::new))
                        })
                    }
                    Err(err) => {
                        self.downloading = false;
                        self.status = format!("Failed to store sample: {}", err);
                        Task::none()
                    }
                }
            }
            Message::Loaded(Ok(payload)) => {
                self.downloading = false;
                for layer in payload {
                    self.layers.add_layer(layer);
                }
                self.status = "Sample image loaded.".to_string();
                self.refresh_preview();
                Task::none()
            }
            Message::Loaded(Err(err)) => {
                self.downloading = false;
                error!(%err, "failed to decode downloaded sample");
                self.status = format!("Failed to load sample: {}", err);
                Task::none()
            }
            Message::Download(DownloadEvent::Failed(err)) => {
                self.progress = None;
                self.downloading = false;
                if let Some(coordinator) = &self.coordinator {
                    coordinator.abandon(&mut self.layers, &err);
                }
                self.status = format!("Download failed: {}", err);
                self.refresh_preview();
                Task::none()
            }
        }
    }

    /// Re-render the top layer for display
    fn refresh_preview(&mut self) {
        self.preview = self
            .layers
            .top()
            .and_then(|layer| layer.data.to_rgba8())
            .map(|rgba| {
                let (width, height) = rgba.dimensions();
                iced::widget::image::Handle::from_rgba(width, height, rgba.into_raw())
            });
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let mut content: Column<Message> = column![
            text("Piroplasma").size(48),
            button("Open Sample Image")
                .on_press_maybe((!self.downloading).then_some(Message::OpenSample))
                .padding(10),
            text(&self.status).size(16),
        ]
        .spacing(20)
        .padding(40)
        .align_x(Alignment::Center);

        if let Some(progress) = &self.progress {
            content = content.push(
                progress_bar(0.0..=1.0, progress.fraction().min(1.0)).width(Length::Fixed(400.0)),
            );
        }

        for name in self.layers.names() {
            content = content.push(text(name).size(14));
        }

        if let Some(handle) = &self.preview {
            content = content.push(
                iced::widget::image(handle.clone())
                    .width(Length::Fill)
                    .height(Length::Fill),
            );
        }

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn main() -> iced::Result {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "piroplasma=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    iced::application("Piroplasma", Viewer::update, Viewer::view)
        .theme(Viewer::theme)
        .centered()
        .run_with(Viewer::new)
}
