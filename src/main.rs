use chrono::Utc;
use iced::widget::image::Handle;
use iced::widget::{
    button, canvas, column, container, image as picture, mouse_area, opaque, pick_list, row, scrollable, stack, text,
    text_input, Column, Space,
};
use iced::{keyboard, window, Alignment, Color, Element, Length, Subscription, Task, Theme};
use iced_aw::Wrap;
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageDialogResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod archive;
mod config;
mod imaging;
mod logging;
mod state;
mod ui;
mod view;

use config::Settings;
use imaging::{CropPipeline, CropPoint};
use state::catalog::{CatalogRepository, NewEntry};
use state::data::{CatalogEntry, EntryId, ImagePayload, Rank};
use state::library::{Library, SqliteStore};
use state::snapshot::{self, HttpTransport, RemoteSnapshotLoader};
use ui::canvas::CropSurface;
use ui::notice::Notice;
use view::editor::{EditorListView, EditorRow};
use view::grid::{CardView, DetailView, GridView, RowContent};

/// File types offered by the image picker
const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Editor,
    Viewer,
}

/// Main application state
struct TierDeck {
    /// The catalog, written through to the local store
    catalog: CatalogRepository<SqliteStore>,
    /// Published snapshot source for the viewer
    loader: RemoteSnapshotLoader<HttpTransport>,
    mode: Mode,

    // ===== Editor =====
    crop: CropPipeline,
    /// Rendered crop preview (with selection overlay)
    crop_frame: Option<Handle>,
    /// Thumbnail produced by the last successful apply
    cropped: Option<ImagePayload>,
    cropped_handle: Option<Handle>,
    title: String,
    rank: Rank,
    description: String,
    /// Entry targeted by the "move to tier" bar
    selected: Option<EntryId>,
    editor_list: EditorListView,

    // ===== Viewer =====
    grid: GridView,
    viewer_entries: Vec<CatalogEntry>,
    detail: Option<DetailView>,

    /// Decoded thumbnails for whichever list is on screen
    thumbnails: HashMap<EntryId, Handle>,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    ShowEditor,
    ShowViewer,
    SnapshotFetched(Option<Vec<CatalogEntry>>),

    PickImage,
    FileDropped(PathBuf),
    PasteImage,
    ImageFileLoaded(Result<Vec<u8>, String>),
    CropPointerDown(CropPoint),
    CropPointerMoved(CropPoint),
    CropPointerUp,
    ApplyCrop,
    ResetCrop,

    TitleChanged(String),
    RankPicked(Rank),
    DescriptionChanged(String),
    AddEntry,
    DeleteEntry(EntryId),
    SetRank(EntryId, Rank),
    SelectEntry(EntryId),
    MoveSelected(Rank),

    Import,
    Export,
    ExportReady(Result<Arc<Vec<u8>>, String>),

    OpenDetail(EntryId),
    CloseDetail,
}

impl TierDeck {
    fn new(catalog: CatalogRepository<SqliteStore>, loader: RemoteSnapshotLoader<HttpTransport>) -> (Self, Task<Message>) {
        let mut app = TierDeck {
            catalog,
            loader,
            mode: Mode::Editor,
            crop: CropPipeline::Idle,
            crop_frame: None,
            cropped: None,
            cropped_handle: None,
            title: String::new(),
            rank: Rank::TOP,
            description: String::new(),
            selected: None,
            editor_list: EditorListView::build(Vec::new()),
            grid: GridView::build(&[], None),
            viewer_entries: Vec::new(),
            detail: None,
            thumbnails: HashMap::new(),
            status: String::from("Ready."),
        };
        app.refresh_editor();

        (app, Task::none())
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ShowEditor => {
                self.mode = Mode::Editor;
                self.detail = None;
                self.refresh_editor();
            }
            Message::ShowViewer => {
                self.mode = Mode::Viewer;
                self.status = "Loading tier list...".to_string();

                let loader = self.loader.clone();
                return Task::perform(async move { loader.fetch().await }, Message::SnapshotFetched);
            }
            Message::SnapshotFetched(fetched) => {
                let entries = snapshot::resolve(fetched, self.catalog.library());
                let last_update = self.catalog.library().read_last_update().unwrap_or_else(|e| {
                    tracing::warn!("⚠️  Could not read last update: {}", e);
                    None
                });

                self.grid = GridView::build(&entries, last_update);
                self.cache_thumbnails(&entries);
                self.status = format!("{} games loaded.", entries.len());
                self.viewer_entries = entries;
            }

            Message::PickImage => {
                let picked = FileDialog::new()
                    .set_title("Select an image")
                    .add_filter("Images", &IMAGE_EXTENSIONS)
                    .pick_file();

                if let Some(path) = picked {
                    return read_image_file(path);
                }
            }
            Message::FileDropped(path) => {
                if self.mode == Mode::Editor {
                    return read_image_file(path);
                }
            }
            Message::PasteImage => {
                if self.mode == Mode::Editor {
                    let pasted = ui::clipboard::read_image()
                        .and_then(|image| CropPipeline::from_image(image).map_err(|e| e.to_string()));
                    match pasted {
                        Ok(pipeline) => self.start_crop(pipeline),
                        Err(e) => self.notice(Notice::warning(e)),
                    }
                }
            }
            Message::ImageFileLoaded(Ok(bytes)) => match CropPipeline::load(&bytes) {
                Ok(pipeline) => self.start_crop(pipeline),
                Err(e) => self.notice(Notice::warning(e)),
            },
            Message::ImageFileLoaded(Err(e)) => self.notice(Notice::warning(e)),
            Message::CropPointerDown(at) => {
                self.crop = std::mem::take(&mut self.crop).pointer_down(at);
                self.refresh_crop_frame();
            }
            Message::CropPointerMoved(to) => {
                if self.crop.is_selecting() {
                    self.crop = std::mem::take(&mut self.crop).pointer_move(to);
                    self.refresh_crop_frame();
                }
            }
            Message::CropPointerUp => {
                self.crop = std::mem::take(&mut self.crop).pointer_up();
            }
            Message::ApplyCrop => match self.crop.apply() {
                Ok(payload) => {
                    self.cropped_handle = payload.decode().ok().map(|decoded| Handle::from_bytes(decoded.bytes));
                    self.cropped = Some(payload);
                    self.status = "IMAGE READY".to_string();
                }
                Err(e) => self.notice(Notice::warning(e)),
            },
            Message::ResetCrop => {
                self.crop = std::mem::take(&mut self.crop).reset();
                self.refresh_crop_frame();
            }

            Message::TitleChanged(title) => self.title = title,
            Message::RankPicked(rank) => self.rank = rank,
            Message::DescriptionChanged(description) => self.description = description,
            Message::AddEntry => {
                let new = NewEntry {
                    title: self.title.clone(),
                    rank: Some(self.rank),
                    image: self.cropped.clone(),
                    description: Some(self.description.clone()),
                };

                match self.catalog.add(new) {
                    Ok(_) => {
                        self.clear_form();
                        self.status = "Game added successfully!".to_string();
                        self.refresh_editor();
                    }
                    Err(e) => self.notice(Notice::warning(e)),
                }
            }
            Message::DeleteEntry(id) => {
                let confirmed = MessageDialog::new()
                    .set_title("Delete game")
                    .set_description("Are you sure you want to delete this game?")
                    .set_buttons(MessageButtons::YesNo)
                    .show();

                if matches!(confirmed, MessageDialogResult::Yes) {
                    if let Err(e) = self.catalog.remove(id) {
                        self.notice(Notice::warning(e));
                    }
                    if self.selected == Some(id) {
                        self.selected = None;
                    }
                    self.refresh_editor();
                }
            }
            Message::SetRank(id, rank) => self.change_rank(id, rank),
            Message::SelectEntry(id) => {
                self.selected = if self.selected == Some(id) { None } else { Some(id) };
            }
            Message::MoveSelected(rank) => {
                if let Some(id) = self.selected {
                    self.change_rank(id, rank);
                }
            }

            Message::Import => {
                let picked = FileDialog::new()
                    .set_title("Import tier data")
                    .add_filter("Tier data", &["json", "zip"])
                    .pick_file();

                if let Some(path) = picked {
                    match self.import_file(&path) {
                        Ok(count) => self.status = format!("Import completed ({} games).", count),
                        Err(e) => self.notice(Notice::import_failed(e)),
                    }
                    self.selected = None;
                    self.refresh_editor();
                }
            }
            Message::Export => {
                let entries = match self.catalog.list() {
                    Ok(entries) => entries,
                    Err(e) => {
                        self.notice(Notice::warning(e));
                        return Task::none();
                    }
                };

                self.status = "Building tier pack...".to_string();
                return Task::perform(build_archive(entries), Message::ExportReady);
            }
            Message::ExportReady(Ok(bytes)) => {
                let target = FileDialog::new()
                    .set_title("Save tier pack")
                    .set_file_name(archive::DEFAULT_ARCHIVE_NAME)
                    .add_filter("Zip archive", &["zip"])
                    .save_file();

                match target {
                    Some(path) => match archive::save_archive(&path, &bytes) {
                        Ok(()) => self.status = format!("✅ Exported to {}", path.display()),
                        Err(e) => self.notice(Notice::export_failed(e)),
                    },
                    None => self.status = "Export cancelled.".to_string(),
                }
            }
            Message::ExportReady(Err(e)) => self.notice(Notice::export_failed(e)),

            Message::OpenDetail(id) => self.detail = DetailView::find(&self.viewer_entries, id),
            Message::CloseDetail => self.detail = None,
        }

        Task::none()
    }

    fn start_crop(&mut self, pipeline: CropPipeline) {
        self.crop = pipeline;
        self.cropped = None;
        self.cropped_handle = None;
        self.refresh_crop_frame();
        if let Some(image) = self.crop.image() {
            let (width, height) = image.source_size();
            self.status = format!("Loaded {}x{} image. Drag over it to select an area, then apply.", width, height);
        }
    }

    fn refresh_crop_frame(&mut self) {
        self.crop_frame = self
            .crop
            .render_preview()
            .map(|frame| Handle::from_rgba(frame.width(), frame.height(), frame.into_raw()));
    }

    fn clear_form(&mut self) {
        self.title.clear();
        self.description.clear();
        self.rank = Rank::TOP;
        self.crop = CropPipeline::Idle;
        self.crop_frame = None;
        self.cropped = None;
        self.cropped_handle = None;
    }

    fn change_rank(&mut self, id: EntryId, rank: Rank) {
        match self.catalog.set_rank(id, rank) {
            Ok(true) => self.refresh_editor(),
            Ok(false) => {}
            Err(e) => self.notice(Notice::warning(e)),
        }
    }

    fn import_file(&mut self, path: &Path) -> Result<usize, String> {
        let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
        let is_zip = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));

        let imported = if is_zip {
            self.catalog.import_archive(&bytes)
        } else {
            let document = String::from_utf8(bytes).map_err(|e| e.to_string())?;
            self.catalog.replace_all(&document)
        };
        imported.map_err(|e| e.to_string())
    }

    /// Reload the editor list from the store
    fn refresh_editor(&mut self) {
        match self.catalog.list_for_editing() {
            Ok(entries) => {
                self.cache_thumbnails(&entries);
                self.editor_list = EditorListView::build(entries);
            }
            Err(e) => self.notice(Notice::warning(e)),
        }
    }

    fn cache_thumbnails(&mut self, entries: &[CatalogEntry]) {
        self.thumbnails = entries
            .iter()
            .filter_map(|entry| {
                let decoded = entry.image.as_ref()?.decode().ok()?;
                Some((entry.id, Handle::from_bytes(decoded.bytes)))
            })
            .collect();
    }

    /// Block on a warning dialog; the status line goes back to idle
    fn notice(&mut self, notice: Notice) {
        notice.show();
        self.status = "Ready.".to_string();
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let header = row![
            text("TIER LIST").size(32),
            Space::with_width(Length::Fill),
            button("EDITOR").on_press(Message::ShowEditor),
            button("VIEWER").on_press(Message::ShowViewer),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let body = match self.mode {
            Mode::Editor => self.editor_view(),
            Mode::Viewer => self.viewer_view(),
        };

        let content = column![header, text(&self.status).size(14), body]
            .spacing(16)
            .padding(24);

        let base = container(content).width(Length::Fill).height(Length::Fill);

        match (&self.mode, &self.detail) {
            (Mode::Viewer, Some(detail)) => stack![base, self.detail_overlay(detail)].into(),
            _ => base.into(),
        }
    }

    fn editor_view(&self) -> Element<'_, Message> {
        let source = row![
            button("UPLOAD IMAGE").on_press(Message::PickImage),
            text("or drop a file here, or press Ctrl+V to paste").size(14),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let mut form = Column::new().spacing(12).push(source);

        if let (Some(frame), Some(image)) = (&self.crop_frame, self.crop.image()) {
            let (width, height) = image.preview_size();
            let (width, height) = (Length::Fixed(width as f32), Length::Fixed(height as f32));

            form = form
                .push(stack![
                    picture(frame.clone()).width(width).height(height),
                    canvas(CropSurface).width(width).height(height),
                ])
                .push(
                    row![
                        button("APPLY CROP").on_press(Message::ApplyCrop),
                        button("RESET").on_press(Message::ResetCrop),
                    ]
                    .spacing(10),
                );
        }

        if let Some(handle) = &self.cropped_handle {
            form = form.push(
                row![
                    picture(handle.clone()).width(Length::Fixed(200.0)),
                    text("IMAGE READY").size(16),
                ]
                .spacing(10)
                .align_y(Alignment::Center),
            );
        }

        form = form
            .push(text_input("Game title", &self.title).on_input(Message::TitleChanged))
            .push(pick_list(Rank::ALL, Some(self.rank), Message::RankPicked))
            .push(text_input("Description (optional)", &self.description).on_input(Message::DescriptionChanged))
            .push(
                row![
                    button("ADD GAME").on_press(Message::AddEntry),
                    Space::with_width(Length::Fill),
                    button("⬆ IMPORT").on_press(Message::Import),
                    button("⬇ EXPORT ZIP").on_press(Message::Export),
                ]
                .spacing(10),
            );

        let move_bar = Rank::ALL.iter().fold(
            row![text("Move selected →").size(14)].spacing(8).align_y(Alignment::Center),
            |bar, &rank| {
                bar.push(
                    button(text(rank.to_string()))
                        .on_press_maybe(self.selected.map(|_| Message::MoveSelected(rank))),
                )
            },
        );

        let list: Element<'_, Message> = match &self.editor_list {
            EditorListView::Empty(marker) => text(*marker).into(),
            EditorListView::Rows(rows) => {
                let items = rows
                    .iter()
                    .fold(Column::new().spacing(8), |items, entry_row| items.push(self.editor_row(entry_row)));
                scrollable(items).height(Length::Fill).into()
            }
        };

        column![form, move_bar, list].spacing(16).into()
    }

    fn editor_row<'a>(&'a self, entry_row: &'a EditorRow) -> Element<'a, Message> {
        let id = entry_row.id;
        let style = if self.selected == Some(id) {
            button::primary
        } else {
            button::text
        };

        row![
            self.thumbnail(id, 64.0),
            button(column![text(&entry_row.title).size(18), text(&entry_row.rank_label).size(14)])
                .style(style)
                .width(Length::Fill)
                .on_press(Message::SelectEntry(id)),
            pick_list(Rank::ALL, Some(entry_row.rank), move |rank| Message::SetRank(id, rank)),
            button("DELETE").style(button::danger).on_press(Message::DeleteEntry(id)),
        ]
        .spacing(10)
        .align_y(Alignment::Center)
        .into()
    }

    fn viewer_view(&self) -> Element<'_, Message> {
        let rows = self.grid.rows.iter().fold(Column::new().spacing(12), |rows, rank_row| {
            let content: Element<'_, Message> = match &rank_row.content {
                RowContent::Empty(marker) => text(*marker).size(14).into(),
                RowContent::Cards(cards) => Wrap::with_elements(cards.iter().map(|card| self.card(card)).collect())
                    .spacing(8.0)
                    .line_spacing(8.0)
                    .into(),
            };

            rows.push(
                row![
                    container(text(&rank_row.label).size(32)).center_x(Length::Fixed(60.0)),
                    content,
                ]
                .spacing(12)
                .align_y(Alignment::Center),
            )
        });

        let stats = &self.grid.stats;
        column![
            scrollable(rows).height(Length::Fill),
            text(format!("TOTAL GAMES: {}    LAST UPDATE: {}", stats.total, stats.last_update)).size(14),
        ]
        .spacing(12)
        .into()
    }

    fn card<'a>(&'a self, card: &'a CardView) -> Element<'a, Message> {
        button(
            column![self.thumbnail(card.id, 120.0), text(&card.title).size(14)]
                .spacing(4)
                .width(Length::Fixed(120.0))
                .align_x(Alignment::Center),
        )
        .style(button::text)
        .on_press(Message::OpenDetail(card.id))
        .into()
    }

    fn detail_overlay<'a>(&'a self, detail: &'a DetailView) -> Element<'a, Message> {
        let panel = column![
            row![
                text(&detail.title).size(24),
                Space::with_width(Length::Fill),
                button("CLOSE").on_press(Message::CloseDetail),
            ]
            .align_y(Alignment::Center),
            self.thumbnail(detail.id, 320.0),
            text(&detail.tier_label).size(18),
            text(&detail.description),
        ]
        .spacing(12)
        .padding(20)
        .width(Length::Fixed(480.0));

        let backdrop = container(opaque(container(panel).style(container::rounded_box)))
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .style(|_theme: &Theme| container::Style {
                background: Some(Color::from_rgba(0.0, 0.0, 0.0, 0.7).into()),
                ..Default::default()
            });

        // clicking outside the panel closes it
        opaque(mouse_area(backdrop).on_press(Message::CloseDetail))
    }

    fn thumbnail(&self, id: EntryId, size: f32) -> Element<'_, Message> {
        match self.thumbnails.get(&id) {
            Some(handle) => picture(handle.clone())
                .width(Length::Fixed(size))
                .height(Length::Fixed(size))
                .into(),
            None => container(text("NO IMAGE").size(12))
                .center_x(Length::Fixed(size))
                .center_y(Length::Fixed(size))
                .into(),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let drops = iced::event::listen_with(|event, _status, _window| match event {
            iced::Event::Window(window::Event::FileDropped(path)) => Some(Message::FileDropped(path)),
            _ => None,
        });

        let paste = keyboard::on_key_press(|key, modifiers| match key.as_ref() {
            keyboard::Key::Character("v") if modifiers.command() => Some(Message::PasteImage),
            _ => None,
        });

        Subscription::batch([drops, paste])
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Build the zip off the UI thread
async fn build_archive(entries: Vec<CatalogEntry>) -> Result<Arc<Vec<u8>>, String> {
    tokio::task::spawn_blocking(move || {
        archive::export(&entries, Utc::now())
            .map(Arc::new)
            .map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| format!("Export task failed: {}", e))
    .and_then(|result| result)
}

fn read_image_file(path: PathBuf) -> Task<Message> {
    Task::perform(
        async move {
            tokio::fs::read(&path)
                .await
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))
        },
        Message::ImageFileLoaded,
    )
}

/// Open the store and the snapshot transport described by the settings
fn startup() -> Result<(CatalogRepository<SqliteStore>, RemoteSnapshotLoader<HttpTransport>), String> {
    let settings = Settings::load().map_err(|e| e.to_string())?;
    let data_dir = settings.data_dir().map_err(|e| e.to_string())?;

    let store = SqliteStore::open(&data_dir).map_err(|e| e.to_string())?;
    let catalog = CatalogRepository::new(Library::new(store));
    let entry_count = catalog.list().map(|entries| entries.len()).unwrap_or(0);
    if let Some(path) = catalog.library().store().path() {
        tracing::info!("📚 Catalog store at {}", path.display());
    }

    let transport =
        HttpTransport::new(settings.snapshot_url.clone(), settings.request_timeout()).map_err(|e| e.to_string())?;
    tracing::info!("🎮 TierDeck started with {} games, snapshot at {}", entry_count, transport.url());

    Ok((catalog, RemoteSnapshotLoader::new(transport)))
}

fn main() -> iced::Result {
    logging::init();

    // The app cannot function without its catalog store
    let (catalog, loader) = match startup() {
        Ok(parts) => parts,
        Err(e) => {
            tracing::error!("❌ Failed to start: {}", e);
            eprintln!("Failed to start TierDeck: {}", e);
            std::process::exit(1);
        }
    };

    iced::application("TierDeck", TierDeck::update, TierDeck::view)
        .theme(TierDeck::theme)
        .subscription(TierDeck::subscription)
        .centered()
        .run_with(move || TierDeck::new(catalog, loader))
}
