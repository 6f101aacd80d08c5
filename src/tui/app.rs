use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::*;
use tokio::sync::mpsc;

use crate::api::{ApiClient, ApiError, Note, NoteTag, NotesPage};
use crate::config::Config;
use crate::service::debounce::{SEARCH_DEBOUNCE, SearchDebouncer};
use crate::service::query::{QueryCache, QueryKey, QueryView};
use crate::tui::form::{FormField, FormSubmit, NoteForm};

pub const PER_PAGE: u32 = 12;

pub enum AppMode {
    List,
    View,
    Edit,
    Create,
    Search,
    DeleteConfirm,
    Help,
}

/// Outcome of a spawned API call, delivered back to the main loop over the
/// app channel. Fetch results carry the key they were requested under so
/// the cache can file late arrivals correctly.
pub enum ApiEvent {
    NotesLoaded {
        key: QueryKey,
        result: Result<NotesPage, ApiError>,
    },
    NoteLoaded {
        id: String,
        result: Result<Note, ApiError>,
    },
    NoteCreated(Result<Note, ApiError>),
    NoteUpdated(Result<Note, ApiError>),
    NoteDeleted {
        id: String,
        result: Result<Note, ApiError>,
    },
}

pub struct App {
    pub client: ApiClient,
    pub cache: QueryCache,
    pub debouncer: SearchDebouncer,
    tx: mpsc::UnboundedSender<ApiEvent>,
    pub rx: mpsc::UnboundedReceiver<ApiEvent>,
    pub mode: AppMode,
    /// Live text in the search box.
    pub search_input: String,
    /// The debounced term the active query key was built from.
    pub search_term: String,
    pub current_page: u32,
    pub selected_index: usize,
    pub current_note: Option<Note>,
    /// Id whose fresh copy we asked for; detail results for anything else
    /// arrive too late to matter and are dropped.
    pub viewing_id: Option<String>,
    pub form: Option<NoteForm>,
    pub should_quit: bool,
    pub status_message: Option<String>,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        let client = ApiClient::new(config).context("Failed to build the HTTP client")?;
        let (tx, rx) = mpsc::unbounded_channel();
        let cache = QueryCache::new(QueryKey::new(1, PER_PAGE, ""));

        Ok(App {
            client,
            cache,
            debouncer: SearchDebouncer::new(SEARCH_DEBOUNCE),
            tx,
            rx,
            mode: AppMode::List,
            search_input: String::new(),
            search_term: String::new(),
            current_page: 1,
            selected_index: 0,
            current_note: None,
            viewing_id: None,
            form: None,
            should_quit: false,
            status_message: None,
        })
    }

    fn list_key(&self) -> QueryKey {
        QueryKey::new(self.current_page, PER_PAGE, &self.search_term)
    }

    /// Spawn whatever request the cache says is missing. Called once per
    /// loop iteration, after input and API events have been handled.
    pub fn sync(&mut self) {
        if let Some(key) = self.cache.needs_fetch() {
            self.cache.begin_fetch(&key);
            self.spawn_fetch_notes(key);
        }
    }

    /// The debounced search term has settled; rebuild the active key.
    pub fn apply_search(&mut self, term: &str) {
        self.search_term = term.to_string();
        let key = self.list_key();
        self.cache.set_key(key);
    }

    /// Page selection as a pagination widget reports it, zero-based.
    pub fn select_page(&mut self, selected: usize) {
        self.current_page = selected as u32 + 1;
        self.selected_index = 0;
        let key = self.list_key();
        self.cache.set_key(key);
    }

    fn total_pages(&self) -> u32 {
        match self.cache.view() {
            QueryView::Ready { page, .. } => page.total_pages,
            _ => 0,
        }
    }

    fn visible_notes_len(&self) -> usize {
        match self.cache.view() {
            QueryView::Ready { page, .. } => page.notes.len(),
            _ => 0,
        }
    }

    fn selected_note(&self) -> Option<Note> {
        match self.cache.view() {
            QueryView::Ready { page, .. } => page.notes.get(self.selected_index).cloned(),
            _ => None,
        }
    }

    /// Every search keystroke resets to page one immediately; the term
    /// itself only reaches the query key once the debounce settles.
    fn search_changed(&mut self) {
        self.current_page = 1;
        self.selected_index = 0;
        self.debouncer.push(&self.search_input);
        let key = self.list_key();
        self.cache.set_key(key);
    }

    pub fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) -> Result<()> {
        match self.mode {
            AppMode::List => self.handle_list_key(key)?,
            AppMode::View => self.handle_view_key(key)?,
            AppMode::Edit => self.handle_form_key(key, modifiers)?,
            AppMode::Create => self.handle_form_key(key, modifiers)?,
            AppMode::Search => self.handle_search_key(key)?,
            AppMode::DeleteConfirm => self.handle_delete_confirm_key(key)?,
            AppMode::Help => self.handle_help_key(key)?,
        }
        Ok(())
    }

    fn handle_list_key(&mut self, key: KeyCode) -> Result<()> {
        match key {
            KeyCode::Esc => {
                if !self.search_input.is_empty() || !self.search_term.is_empty() {
                    // Clear search immediately rather than through the debounce
                    self.search_input.clear();
                    self.search_term.clear();
                    self.search_changed();
                } else {
                    self.should_quit = true;
                }
            }
            KeyCode::Char('/') => {
                self.mode = AppMode::Search;
                self.status_message = None;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                let max_index = self.visible_notes_len().saturating_sub(1);
                if self.selected_index < max_index {
                    self.selected_index += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.selected_index > 0 {
                    self.selected_index -= 1;
                }
            }
            KeyCode::Char('l') | KeyCode::Right => {
                // Next page, only when there is more than one
                let total = self.total_pages();
                if total > 1 && self.current_page < total {
                    self.select_page(self.current_page as usize);
                }
            }
            KeyCode::Char('h') | KeyCode::Left => {
                if self.total_pages() > 1 && self.current_page > 1 {
                    self.select_page(self.current_page as usize - 2);
                }
            }
            KeyCode::Char('n') => {
                self.mode = AppMode::Create;
                self.form = Some(NoteForm::new());
                self.status_message = None;
            }
            KeyCode::Char('d') => {
                if let Some(note) = self.selected_note() {
                    self.current_note = Some(note);
                    self.mode = AppMode::DeleteConfirm;
                    self.status_message = None;
                }
            }
            KeyCode::Char('r') => {
                // Refetch everything from the server
                self.cache.invalidate_all();
                self.status_message = Some("Refreshing notes...".to_string());
            }
            KeyCode::Char('?') => {
                self.mode = AppMode::Help;
            }
            KeyCode::Enter => {
                if let Some(note) = self.selected_note() {
                    let id = note.id.clone();
                    self.current_note = Some(note);
                    self.viewing_id = Some(id.clone());
                    self.mode = AppMode::View;
                    self.status_message = None;
                    self.spawn_fetch_note(id);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_view_key(&mut self, key: KeyCode) -> Result<()> {
        match key {
            KeyCode::Esc => {
                self.mode = AppMode::List;
                self.current_note = None;
                self.viewing_id = None;
                self.status_message = None;
            }
            KeyCode::Char('e') => {
                if let Some(ref note) = self.current_note {
                    self.form = Some(NoteForm::edit(note));
                    self.mode = AppMode::Edit;
                    self.status_message = None;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_search_key(&mut self, key: KeyCode) -> Result<()> {
        match key {
            KeyCode::Esc | KeyCode::Enter => {
                // The box keeps its text; a pending debounce still applies
                self.mode = AppMode::List;
            }
            KeyCode::Char(c) => {
                self.search_input.push(c);
                self.search_changed();
            }
            KeyCode::Backspace => {
                self.search_input.pop();
                self.search_changed();
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_form_key(&mut self, key: KeyCode, modifiers: KeyModifiers) -> Result<()> {
        if self.form.is_none() {
            self.mode = AppMode::List;
            return Ok(());
        }
        match key {
            KeyCode::Esc => {
                self.close_form();
            }
            KeyCode::Char('s') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.submit_form();
            }
            KeyCode::Enter => {
                let in_content = self
                    .form
                    .as_ref()
                    .map(|form| form.focus == FormField::Content)
                    .unwrap_or(false);
                if in_content {
                    if let Some(form) = self.form.as_mut() {
                        form.draft.content.push('\n');
                    }
                } else {
                    self.submit_form();
                }
            }
            KeyCode::Tab => {
                if let Some(form) = self.form.as_mut() {
                    form.focus_next();
                }
            }
            KeyCode::BackTab => {
                if let Some(form) = self.form.as_mut() {
                    form.focus_prev();
                }
            }
            KeyCode::Left => {
                if let Some(form) = self.form.as_mut() {
                    if form.focus == FormField::Tag {
                        form.cycle_tag(false);
                    }
                }
            }
            KeyCode::Right => {
                if let Some(form) = self.form.as_mut() {
                    if form.focus == FormField::Tag {
                        form.cycle_tag(true);
                    }
                }
            }
            KeyCode::Char(c) => {
                if let Some(form) = self.form.as_mut() {
                    match form.focus {
                        FormField::Title => form.draft.title.push(c),
                        FormField::Content => form.draft.content.push(c),
                        FormField::Tag => {}
                    }
                }
            }
            KeyCode::Backspace => {
                if let Some(form) = self.form.as_mut() {
                    match form.focus {
                        FormField::Title => {
                            form.draft.title.pop();
                        }
                        FormField::Content => {
                            form.draft.content.pop();
                        }
                        FormField::Tag => {}
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_delete_confirm_key(&mut self, key: KeyCode) -> Result<()> {
        match key {
            KeyCode::Char('y') | KeyCode::Enter => {
                if let Some(ref note) = self.current_note {
                    self.spawn_delete(note.id.clone());
                }
                self.mode = AppMode::List;
                self.current_note = None;
            }
            KeyCode::Esc | KeyCode::Char('n') => {
                // Cancel deletion
                self.mode = AppMode::List;
                self.current_note = None;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_help_key(&mut self, key: KeyCode) -> Result<()> {
        match key {
            KeyCode::Esc => {
                self.mode = AppMode::List;
            }
            _ => {}
        }
        Ok(())
    }

    fn close_form(&mut self) {
        let was_editing = self
            .form
            .as_ref()
            .map(|form| form.editing_id.is_some())
            .unwrap_or(false);
        self.form = None;
        self.mode = if was_editing {
            AppMode::View
        } else {
            AppMode::List
        };
    }

    fn submit_form(&mut self) {
        let submit = match self.form.as_mut() {
            Some(form) => form.begin_submit(),
            None => None,
        };
        match submit {
            Some(FormSubmit::Create(request)) => self.spawn_create(request),
            Some(FormSubmit::Update { id, request }) => self.spawn_update(id, request),
            None => {}
        }
    }

    pub fn handle_api_event(&mut self, event: ApiEvent) {
        match event {
            ApiEvent::NotesLoaded { key, result } => {
                self.cache
                    .complete(&key, result.map_err(|err| err.to_string()));
                self.clamp_to_view();
            }
            ApiEvent::NoteLoaded { id, result } => {
                if self.viewing_id.as_deref() != Some(id.as_str()) {
                    return;
                }
                match result {
                    Ok(note) => {
                        if matches!(self.mode, AppMode::View) {
                            self.current_note = Some(note);
                        }
                    }
                    Err(err) => {
                        self.status_message = Some(format!("✗ Failed to load note: {}", err));
                    }
                }
            }
            ApiEvent::NoteCreated(result) => match result {
                Ok(note) => {
                    self.form = None;
                    self.mode = AppMode::List;
                    self.cache.invalidate_all();
                    self.status_message = Some(format!("✓ Created: {}", note.title));
                }
                Err(err) => match self.form.as_mut() {
                    Some(form) => form.submit_failed(err.to_string()),
                    None => {
                        self.status_message = Some(format!("✗ Failed to create note: {}", err));
                    }
                },
            },
            ApiEvent::NoteUpdated(result) => match result {
                Ok(note) => {
                    self.form = None;
                    self.cache.invalidate_all();
                    self.status_message = Some(format!("✓ Updated: {}", note.title));
                    if matches!(self.mode, AppMode::Edit) {
                        self.viewing_id = Some(note.id.clone());
                        self.current_note = Some(note);
                        self.mode = AppMode::View;
                    } else if self.viewing_id.as_deref() == Some(note.id.as_str()) {
                        self.current_note = Some(note);
                    }
                }
                Err(err) => match self.form.as_mut() {
                    Some(form) => form.submit_failed(err.to_string()),
                    None => {
                        self.status_message = Some(format!("✗ Failed to update note: {}", err));
                    }
                },
            },
            ApiEvent::NoteDeleted { id, result } => match result {
                Ok(note) => {
                    self.cache.invalidate_all();
                    self.status_message = Some(format!("✓ Deleted: {}", note.title));
                    if self.viewing_id.as_deref() == Some(id.as_str()) {
                        self.mode = AppMode::List;
                        self.current_note = None;
                        self.viewing_id = None;
                    }
                }
                Err(err) => {
                    self.status_message = Some(format!("✗ Failed to delete: {}", err));
                }
            },
        }
    }

    /// Keep the page and row selection valid against whatever the active
    /// view now shows. A shrunken result set can leave us past the last
    /// page; step back to it and let the next sync fetch it.
    fn clamp_to_view(&mut self) {
        let (total, len) = match self.cache.view() {
            QueryView::Ready { page, .. } => (page.total_pages, page.notes.len()),
            _ => return,
        };
        if total > 0 && self.current_page > total {
            self.current_page = total;
            self.selected_index = 0;
            let key = self.list_key();
            self.cache.set_key(key);
        } else if len == 0 {
            self.selected_index = 0;
        } else if self.selected_index >= len {
            self.selected_index = len - 1;
        }
    }

    fn spawn_fetch_notes(&self, key: QueryKey) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client
                .fetch_notes(key.page, key.per_page, key.search.as_deref())
                .await;
            let _ = tx.send(ApiEvent::NotesLoaded { key, result });
        });
    }

    fn spawn_fetch_note(&self, id: String) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.fetch_note(&id).await;
            let _ = tx.send(ApiEvent::NoteLoaded { id, result });
        });
    }

    fn spawn_create(&self, request: crate::api::CreateNoteRequest) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.create_note(&request).await;
            let _ = tx.send(ApiEvent::NoteCreated(result));
        });
    }

    fn spawn_update(&self, id: String, request: crate::api::UpdateNoteRequest) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.update_note(&id, &request).await;
            let _ = tx.send(ApiEvent::NoteUpdated(result));
        });
    }

    fn spawn_delete(&self, id: String) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.delete_note(&id).await;
            let _ = tx.send(ApiEvent::NoteDeleted { id, result });
        });
    }

    pub fn render(&self, frame: &mut Frame) {
        match self.mode {
            AppMode::List => self.render_list(frame),
            AppMode::View => self.render_view(frame),
            AppMode::Edit => self.render_form(frame, "Edit Note"),
            AppMode::Create => self.render_form(frame, "New Note"),
            AppMode::Search => self.render_search(frame),
            AppMode::DeleteConfirm => self.render_delete_confirm(frame),
            AppMode::Help => self.render_help(frame),
        }
    }

    fn render_list(&self, frame: &mut Frame) {
        let show_pagination = self.total_pages() > 1;
        let constraints = if show_pagination {
            vec![
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
                Constraint::Length(3),
            ]
        } else {
            vec![
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ]
        };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(frame.area());

        // Title bar
        let title_text = if self.search_term.trim().is_empty() {
            "NoteHub - Notes in the cloud".to_string()
        } else {
            format!("NoteHub - Notes in the cloud (Search: {})", self.search_term)
        };
        let title = Paragraph::new(title_text)
            .block(Block::default().borders(Borders::ALL).title("NoteHub"))
            .style(Style::default().fg(Color::Cyan));
        frame.render_widget(title, chunks[0]);

        self.render_notes_area(frame, chunks[1]);

        if show_pagination {
            self.render_pagination(frame, chunks[2]);
        }

        self.render_bottom(
            frame,
            chunks[chunks.len() - 1],
            "j/k: navigate | h/l: page | n: new | /: search | d: delete | r: refresh | ?: help | Enter: view | Esc: quit",
        );
    }

    fn render_notes_area(&self, frame: &mut Frame, area: Rect) {
        match self.cache.view() {
            QueryView::Loading => {
                let loading = Paragraph::new("Loading, please wait...")
                    .block(Block::default().borders(Borders::ALL).title("Notes"))
                    .style(Style::default().fg(Color::Yellow));
                frame.render_widget(loading, area);
            }
            QueryView::Failed { message } => {
                let error = Paragraph::new(format!("Error loading notes: {}", message))
                    .block(Block::default().borders(Borders::ALL).title("Notes"))
                    .wrap(Wrap { trim: true })
                    .style(Style::default().fg(Color::Red));
                frame.render_widget(error, area);
            }
            QueryView::Ready { page, refreshing } => {
                if page.notes.is_empty() {
                    let empty = Paragraph::new("No notes found. Create your first note!")
                        .block(Block::default().borders(Borders::ALL).title("Notes"))
                        .style(Style::default().fg(Color::DarkGray));
                    frame.render_widget(empty, area);
                    return;
                }

                let items: Vec<ListItem> = page
                    .notes
                    .iter()
                    .enumerate()
                    .map(|(i, note)| {
                        let is_selected = i == self.selected_index;
                        let base_style = if is_selected {
                            Style::default().fg(Color::Yellow).bg(Color::DarkGray)
                        } else {
                            Style::default()
                        };

                        let mut lines = vec![Line::default()];

                        let title_line = if is_selected {
                            Line::from(vec![
                                Span::styled("▶ ", Style::default().fg(Color::Cyan)),
                                Span::styled(
                                    &note.title,
                                    Style::default()
                                        .fg(Color::White)
                                        .add_modifier(Modifier::BOLD),
                                ),
                            ])
                        } else {
                            Line::from(vec![
                                Span::styled("  ", Style::default()),
                                Span::styled(&note.title, Style::default().fg(Color::White)),
                            ])
                        };
                        lines.push(title_line);

                        // First line of content, truncated
                        let preview = note.content.lines().next().unwrap_or("").trim();
                        let preview_truncated: String = if preview.chars().count() > 60 {
                            format!("{}...", preview.chars().take(60).collect::<String>())
                        } else {
                            preview.to_string()
                        };
                        if !preview_truncated.is_empty() {
                            lines.push(Line::from(vec![
                                Span::styled("  ", Style::default()),
                                Span::styled(
                                    preview_truncated,
                                    Style::default().fg(Color::DarkGray),
                                ),
                            ]));
                        }

                        let date_str = short_date(&note.created_at);
                        lines.push(Line::from(vec![
                            Span::styled(
                                format!("  [{}] ", note.tag),
                                Style::default().fg(tag_color(note.tag)),
                            ),
                            Span::styled(
                                format!("📅 {}", date_str),
                                Style::default().fg(Color::DarkGray),
                            ),
                        ]));

                        ListItem::new(lines).style(base_style)
                    })
                    .collect();

                let mut state = ListState::default();
                state.select(Some(self.selected_index));

                let list_title = if refreshing {
                    format!("Notes - page {} (refreshing)", self.current_page)
                } else {
                    format!("Notes - page {}", self.current_page)
                };
                let list = List::new(items)
                    .block(Block::default().borders(Borders::ALL).title(list_title))
                    .highlight_style(Style::default().fg(Color::Yellow).bg(Color::DarkGray))
                    .highlight_symbol("▶ ");
                frame.render_stateful_widget(list, area, &mut state);
            }
        }
    }

    fn render_pagination(&self, frame: &mut Frame, area: Rect) {
        let total = self.total_pages();
        let prev = if self.current_page > 1 { "◀" } else { " " };
        let next = if self.current_page < total { "▶" } else { " " };
        let pagination = Paragraph::new(format!(
            "{} Page {} of {} {}",
            prev, self.current_page, total, next
        ))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Pages"))
        .style(Style::default().fg(Color::Cyan));
        frame.render_widget(pagination, area);
    }

    fn render_view(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(frame.area());

        // Title bar
        let title = Paragraph::new("NoteHub - Notes in the cloud")
            .block(Block::default().borders(Borders::ALL).title("NoteHub"))
            .style(Style::default().fg(Color::Cyan));
        frame.render_widget(title, chunks[0]);

        if let Some(ref note) = self.current_note {
            let mut lines: Vec<Line> = Vec::new();

            let created = long_date(&note.created_at);
            let updated = long_date(&note.updated_at);
            lines.push(Line::from(vec![
                Span::styled("📅 Created: ", Style::default().fg(Color::Cyan)),
                Span::styled(created, Style::default().fg(Color::White)),
                Span::styled("  |  ", Style::default().fg(Color::DarkGray)),
                Span::styled("✏️  Updated: ", Style::default().fg(Color::Cyan)),
                Span::styled(updated, Style::default().fg(Color::White)),
            ]));
            lines.push(Line::from(vec![
                Span::styled("🏷  Tag: ", Style::default().fg(Color::Cyan)),
                Span::styled(
                    note.tag.as_str(),
                    Style::default()
                        .fg(tag_color(note.tag))
                        .add_modifier(Modifier::BOLD),
                ),
            ]));
            lines.push(Line::default());

            for line in note.content.lines() {
                lines.push(Line::from(Span::styled(
                    line,
                    Style::default().fg(Color::White),
                )));
            }

            let content = Paragraph::new(lines)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(note.title.as_str()),
                )
                .wrap(Wrap { trim: true });
            frame.render_widget(content, chunks[1]);
        }

        self.render_bottom(frame, chunks[2], "e: edit | Esc: back");
    }

    fn render_form(&self, frame: &mut Frame, heading: &str) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(frame.area());

        // Title bar
        let title = Paragraph::new(format!("NoteHub - {}", heading))
            .block(Block::default().borders(Borders::ALL).title("NoteHub"))
            .style(Style::default().fg(Color::Cyan));
        frame.render_widget(title, chunks[0]);

        let Some(ref form) = self.form else {
            return;
        };

        let field_block = |field: FormField, label: String| {
            let mut block = Block::default().borders(Borders::ALL);
            block = match form.error_for(field) {
                Some(message) => block.title(format!("{} (✗ {})", label, message)),
                None => block.title(label),
            };
            if form.focus == field {
                block = block.border_style(Style::default().fg(Color::Yellow));
            }
            block
        };

        let title_field = Paragraph::new(form.draft.title.as_str())
            .block(field_block(FormField::Title, "Title".to_string()))
            .style(Style::default().fg(Color::White));
        frame.render_widget(title_field, chunks[1]);

        let content_label = format!("Content ({} chars)", form.draft.content.chars().count());
        let content_field = Paragraph::new(form.draft.content.as_str())
            .block(field_block(FormField::Content, content_label))
            .wrap(Wrap { trim: false })
            .style(Style::default().fg(Color::White));
        frame.render_widget(content_field, chunks[2]);

        let tag_text = format!("◀ {} ▶", form.draft.tag);
        let tag_style = match form.draft.tag.parse::<NoteTag>() {
            Ok(tag) => Style::default().fg(tag_color(tag)),
            Err(_) => Style::default().fg(Color::Red),
        };
        let tag_field = Paragraph::new(tag_text)
            .alignment(Alignment::Center)
            .block(field_block(FormField::Tag, "Tag".to_string()))
            .style(tag_style);
        frame.render_widget(tag_field, chunks[3]);

        if form.submitting {
            let status = Paragraph::new("Submitting...")
                .block(Block::default().borders(Borders::ALL).title("Status"))
                .style(Style::default().fg(Color::Yellow));
            frame.render_widget(status, chunks[4]);
        } else if let Some(ref message) = form.submit_error {
            let status = Paragraph::new(format!("✗ {}", message))
                .block(Block::default().borders(Borders::ALL).title("Status"))
                .style(Style::default().fg(Color::Red));
            frame.render_widget(status, chunks[4]);
        } else {
            let help = Paragraph::new(
                "Tab: next field | ←/→: tag | Enter: save (newline in content) | Ctrl+S: save | Esc: cancel",
            )
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(help, chunks[4]);
        }
    }

    fn render_search(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(frame.area());

        // Title bar
        let title = Paragraph::new("NoteHub - Notes in the cloud")
            .block(Block::default().borders(Borders::ALL).title("NoteHub"))
            .style(Style::default().fg(Color::Cyan));
        frame.render_widget(title, chunks[0]);

        let search_prompt = format!("🔍 {}", self.search_input);
        let search = Paragraph::new(search_prompt.as_str())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Search (updates half a second after you stop typing)"),
            )
            .style(Style::default().fg(Color::Yellow));
        frame.render_widget(search, chunks[1]);

        self.render_notes_area(frame, chunks[2]);

        self.render_bottom(frame, chunks[3], "type to search | Enter/Esc: back to list");
    }

    fn render_delete_confirm(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(frame.area());

        // Title bar
        let title = Paragraph::new("NoteHub - Notes in the cloud")
            .block(Block::default().borders(Borders::ALL).title("NoteHub"))
            .style(Style::default().fg(Color::Cyan));
        frame.render_widget(title, chunks[0]);

        let message = if let Some(ref note) = self.current_note {
            format!(
                "Delete note: {}?\n\nPress Enter/y to confirm, Esc/n to cancel",
                note.title
            )
        } else {
            "Delete note?".to_string()
        };
        let confirm = Paragraph::new(message)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Confirm Delete"),
            )
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(Color::Red));
        frame.render_widget(confirm, chunks[1]);

        self.render_bottom(frame, chunks[2], "Enter/y: confirm | Esc/n: cancel");
    }

    fn render_help(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(frame.area());

        // Title bar
        let title = Paragraph::new("NoteHub - Notes in the cloud")
            .block(Block::default().borders(Borders::ALL).title("NoteHub"))
            .style(Style::default().fg(Color::Cyan));
        frame.render_widget(title, chunks[0]);

        let help_text = r#"📖 Keyboard Shortcuts

LIST MODE:
  j / ↓          Move selection down
  k / ↑          Move selection up
  h / ←          Previous page
  l / →          Next page
  /              Search notes
  n              Create new note
  d              Delete selected note
  r              Refresh from the server
  ?              Show this help
  Enter          View selected note
  Esc            Quit (or clear search)

SEARCH MODE:
  The list follows your input half a second after you stop typing.
  Enter / Esc    Back to the list (keeps the search)

VIEW MODE:
  e              Edit note
  Esc            Back to list

CREATE / EDIT:
  Tab / Shift+Tab    Move between fields
  ← / →              Change the tag
  Enter              Save (inserts a newline in the content field)
  Ctrl+S             Save
  Esc                Cancel"#;

        let help = Paragraph::new(help_text)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .wrap(Wrap { trim: false })
            .style(Style::default().fg(Color::White));
        frame.render_widget(help, chunks[1]);

        self.render_bottom(frame, chunks[2], "Esc: back");
    }

    /// Bottom bar: a status message when one is set, the key hints
    /// otherwise.
    fn render_bottom(&self, frame: &mut Frame, area: Rect, help_text: &str) {
        if let Some(ref message) = self.status_message {
            let status_color = if message.starts_with("✓") {
                Color::Green
            } else if message.starts_with("✗") {
                Color::Red
            } else {
                Color::Yellow
            };
            let status = Paragraph::new(message.as_str())
                .block(Block::default().borders(Borders::ALL).title("Status"))
                .style(Style::default().fg(status_color));
            frame.render_widget(status, area);
        } else {
            let help = Paragraph::new(help_text)
                .block(Block::default().borders(Borders::ALL).title("Help"))
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(help, area);
        }
    }
}

fn tag_color(tag: NoteTag) -> Color {
    match tag {
        NoteTag::Todo => Color::Yellow,
        NoteTag::Work => Color::Blue,
        NoteTag::Personal => Color::Green,
        NoteTag::Meeting => Color::Magenta,
        NoteTag::Shopping => Color::Cyan,
    }
}

fn short_date(raw: &str) -> String {
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(raw) {
        parsed.format("%Y-%m-%d").to_string()
    } else {
        raw.split('T').next().unwrap_or("").to_string()
    }
}

fn long_date(raw: &str) -> String {
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(raw) {
        parsed.format("%Y-%m-%d %H:%M").to_string()
    } else {
        raw.split('T').next().unwrap_or("").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn test_app() -> App {
        let config = Config {
            base_url: "http://127.0.0.1:9/api".to_string(),
            token: "test-token".to_string(),
        };
        App::new(&config).expect("app should construct without touching the network")
    }

    fn note_titled(title: &str) -> Note {
        Note {
            id: format!("id-{}", title),
            title: title.to_string(),
            content: "first line\nsecond line".to_string(),
            tag: NoteTag::Work,
            created_at: "2024-05-17T09:30:00.000Z".to_string(),
            updated_at: "2024-05-17T09:30:00.000Z".to_string(),
        }
    }

    fn page_of(titles: &[&str], total_pages: u32) -> NotesPage {
        NotesPage {
            notes: titles.iter().map(|t| note_titled(t)).collect(),
            total_pages,
        }
    }

    /// Deliver a successful list response for the active key, as if a
    /// spawned fetch had come back.
    fn deliver_active(app: &mut App, page: NotesPage) {
        let key = app.cache.active().clone();
        app.cache.begin_fetch(&key);
        app.handle_api_event(ApiEvent::NotesLoaded {
            key,
            result: Ok(page),
        });
    }

    fn shown_titles(app: &App) -> Vec<String> {
        match app.cache.view() {
            QueryView::Ready { page, .. } => {
                page.notes.iter().map(|n| n.title.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    #[tokio::test]
    async fn select_page_is_one_based_over_zero_based_input() {
        let mut app = test_app();
        app.select_page(3);
        assert_eq!(app.current_page, 4);
        assert_eq!(app.cache.active().page, 4);
    }

    #[tokio::test]
    async fn page_keys_do_nothing_with_a_single_page() {
        let mut app = test_app();
        deliver_active(&mut app, page_of(&["only"], 1));

        app.handle_key(KeyCode::Right, KeyModifiers::NONE).unwrap();
        assert_eq!(app.current_page, 1);
        app.handle_key(KeyCode::Left, KeyModifiers::NONE).unwrap();
        assert_eq!(app.current_page, 1);
    }

    #[tokio::test]
    async fn page_keys_step_within_bounds() {
        let mut app = test_app();
        deliver_active(&mut app, page_of(&["a"], 3));

        app.handle_key(KeyCode::Right, KeyModifiers::NONE).unwrap();
        assert_eq!(app.current_page, 2);
        assert_eq!(app.cache.active().page, 2);

        app.handle_key(KeyCode::Left, KeyModifiers::NONE).unwrap();
        assert_eq!(app.current_page, 1);
        app.handle_key(KeyCode::Left, KeyModifiers::NONE).unwrap();
        assert_eq!(app.current_page, 1, "cannot step before the first page");
    }

    #[tokio::test(start_paused = true)]
    async fn search_keystroke_resets_page_term_applies_after_debounce() {
        let mut app = test_app();
        deliver_active(&mut app, page_of(&["a"], 5));
        app.select_page(2);
        assert_eq!(app.current_page, 3);

        app.handle_key(KeyCode::Char('/'), KeyModifiers::NONE).unwrap();
        app.handle_key(KeyCode::Char('g'), KeyModifiers::NONE).unwrap();

        // page resets immediately, the term itself has not applied yet
        assert_eq!(app.current_page, 1);
        assert_eq!(app.cache.active().page, 1);
        assert_eq!(app.cache.active().search, None);

        let term = app.debouncer.settled().await;
        app.apply_search(&term);
        assert_eq!(app.cache.active().search.as_deref(), Some("g"));
        assert_eq!(app.cache.active().page, 1);
    }

    #[tokio::test]
    async fn whitespace_search_applies_as_no_search() {
        let mut app = test_app();
        app.apply_search("   ");
        assert_eq!(app.cache.active().search, None);
    }

    #[tokio::test]
    async fn late_response_for_an_earlier_page_is_not_shown() {
        let mut app = test_app();
        deliver_active(&mut app, page_of(&["page1"], 3));

        // move to page 2 and then page 3 before page 2 data lands
        app.select_page(1);
        let key2 = app.cache.active().clone();
        app.cache.begin_fetch(&key2);
        app.select_page(2);
        let key3 = app.cache.active().clone();
        app.cache.begin_fetch(&key3);

        app.handle_api_event(ApiEvent::NotesLoaded {
            key: key3,
            result: Ok(page_of(&["page3"], 3)),
        });
        assert_eq!(shown_titles(&app), vec!["page3"]);

        app.handle_api_event(ApiEvent::NotesLoaded {
            key: key2,
            result: Ok(page_of(&["page2"], 3)),
        });
        assert_eq!(shown_titles(&app), vec!["page3"], "straggler must not win");
    }

    #[tokio::test]
    async fn shrunken_result_set_clamps_the_page() {
        let mut app = test_app();
        deliver_active(&mut app, page_of(&["a"], 5));
        app.select_page(4);
        assert_eq!(app.current_page, 5);

        // refetch of page 5 reveals only 2 pages remain
        deliver_active(&mut app, page_of(&[], 2));
        assert_eq!(app.current_page, 2);
        assert_eq!(app.cache.active().page, 2);
    }

    #[tokio::test]
    async fn row_selection_clamps_to_the_new_page() {
        let mut app = test_app();
        deliver_active(&mut app, page_of(&["a", "b", "c"], 2));
        app.handle_key(KeyCode::Char('j'), KeyModifiers::NONE).unwrap();
        app.handle_key(KeyCode::Char('j'), KeyModifiers::NONE).unwrap();
        assert_eq!(app.selected_index, 2);

        deliver_active(&mut app, page_of(&["a"], 2));
        assert_eq!(app.selected_index, 0);
    }

    #[tokio::test]
    async fn create_success_closes_the_form_and_invalidates() {
        let mut app = test_app();
        deliver_active(&mut app, page_of(&["existing"], 1));

        app.mode = AppMode::Create;
        let mut form = NoteForm::new();
        form.draft.title = "Fresh note".to_string();
        assert!(form.begin_submit().is_some());
        app.form = Some(form);

        app.handle_api_event(ApiEvent::NoteCreated(Ok(note_titled("Fresh note"))));

        assert!(matches!(app.mode, AppMode::List));
        assert!(app.form.is_none());
        assert_eq!(app.status_message.as_deref(), Some("✓ Created: Fresh note"));
        assert!(
            matches!(app.cache.view(), QueryView::Ready { refreshing: true, .. }),
            "list must refetch after a create"
        );
        assert!(app.cache.needs_fetch().is_some());
    }

    #[tokio::test]
    async fn create_failure_returns_the_form_to_editing() {
        let mut app = test_app();
        app.mode = AppMode::Create;
        let mut form = NoteForm::new();
        form.draft.title = "Fresh note".to_string();
        assert!(form.begin_submit().is_some());
        app.form = Some(form);

        app.handle_api_event(ApiEvent::NoteCreated(Err(ApiError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "try again later".to_string(),
        })));

        assert!(matches!(app.mode, AppMode::Create), "form stays open");
        let form = app.form.as_ref().expect("form still present");
        assert!(!form.submitting);
        assert_eq!(form.submit_error.as_deref(), Some("try again later"));
    }

    #[tokio::test]
    async fn delete_confirm_cancel_keeps_the_note() {
        let mut app = test_app();
        deliver_active(&mut app, page_of(&["keepme"], 1));

        app.handle_key(KeyCode::Char('d'), KeyModifiers::NONE).unwrap();
        assert!(matches!(app.mode, AppMode::DeleteConfirm));
        assert!(app.current_note.is_some());

        app.handle_key(KeyCode::Char('n'), KeyModifiers::NONE).unwrap();
        assert!(matches!(app.mode, AppMode::List));
        assert!(app.current_note.is_none());
        assert!(app.cache.needs_fetch().is_none(), "nothing was invalidated");
    }

    #[tokio::test]
    async fn delete_success_invalidates_and_reports() {
        let mut app = test_app();
        deliver_active(&mut app, page_of(&["goner"], 1));

        app.handle_api_event(ApiEvent::NoteDeleted {
            id: "id-goner".to_string(),
            result: Ok(note_titled("goner")),
        });
        assert_eq!(app.status_message.as_deref(), Some("✓ Deleted: goner"));
        assert!(app.cache.needs_fetch().is_some());
    }

    #[tokio::test]
    async fn detail_load_for_another_note_is_discarded() {
        let mut app = test_app();
        app.mode = AppMode::View;
        app.viewing_id = Some("id-a".to_string());
        app.current_note = Some(note_titled("a"));

        app.handle_api_event(ApiEvent::NoteLoaded {
            id: "id-b".to_string(),
            result: Ok(note_titled("b")),
        });
        assert_eq!(
            app.current_note.as_ref().map(|n| n.title.as_str()),
            Some("a"),
            "a detail response for a different note must be ignored"
        );

        // leaving the view drops interest in the pending load entirely
        app.handle_key(KeyCode::Esc, KeyModifiers::NONE).unwrap();
        app.handle_api_event(ApiEvent::NoteLoaded {
            id: "id-a".to_string(),
            result: Ok(note_titled("a")),
        });
        assert!(app.current_note.is_none());
    }

    #[tokio::test]
    async fn escape_clears_an_active_search_before_quitting() {
        let mut app = test_app();
        app.search_input = "rust".to_string();
        app.apply_search("rust");

        app.handle_key(KeyCode::Esc, KeyModifiers::NONE).unwrap();
        assert!(!app.should_quit);
        assert!(app.search_input.is_empty());

        app.handle_key(KeyCode::Esc, KeyModifiers::NONE).unwrap();
        assert!(app.should_quit, "second escape quits");
    }

    #[tokio::test]
    async fn sync_spawns_at_most_one_fetch_per_key() {
        let mut app = test_app();
        app.sync();
        assert!(
            app.cache.needs_fetch().is_none(),
            "the spawned fetch must be recorded as in flight"
        );
        // a second sync while the first request is outstanding is a no-op
        app.sync();
    }
}
