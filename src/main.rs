//! Prontui - terminal client for an electronic medical record API
//!
//! Architecture:
//! - UI Layer (Ratatui) - synchronous terminal rendering
//! - App Layer - central state machine processing events
//! - API Layer (Tokio) - async REST calls against the remote server

mod api;
mod app;
mod constants;
mod messages;
mod models;
mod session;
mod signing;
mod ui;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::*, widgets::*};
use tokio::sync::mpsc;

use api::{ApiActor, ApiClient};
use app::{AppActor, AppState};
use messages::ui_events::{key_to_ui_event, InputMode, Screen};
use messages::{ApiCommand, ApiResponse, RenderState, UiEvent};
use models::Patient;
use session::SessionStore;
use signing::{DocumentKind, SIGNING_STEPS};
use ui::{notice_color, render_input, signature_summary, sncr_status_color};

/// Terminal cleanup guard
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging to file
    let file_appender = tracing_appender::rolling::never(".", "prontui.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let _guard = TerminalGuard;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Resume a persisted session, if any
    let store = SessionStore::new();
    let session = store.load();
    let client = ApiClient::new(constants::base_url(), session.clone());

    // Create channels
    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (api_cmd_tx, api_cmd_rx) = mpsc::unbounded_channel::<ApiCommand>();
    let (api_resp_tx, api_resp_rx) = mpsc::unbounded_channel::<ApiResponse>();
    let (render_tx, mut render_rx) = mpsc::unbounded_channel::<RenderState>();

    // Spawn API actor
    let api_actor = ApiActor::new(client, store, api_resp_tx);
    tokio::spawn(api_actor.run(api_cmd_rx));

    // Spawn app actor
    let app_actor = AppActor::new(AppState::new(session), api_cmd_tx, render_tx);
    tokio::spawn(app_actor.run(ui_rx, api_resp_rx));

    // Run UI loop (synchronous with async polling)
    run_ui_loop(&mut terminal, ui_tx, &mut render_rx).await?;

    Ok(())
}

/// Run the synchronous UI rendering loop
async fn run_ui_loop(
    terminal: &mut Terminal<impl Backend>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
    render_rx: &mut mpsc::UnboundedReceiver<RenderState>,
) -> anyhow::Result<()> {
    let mut current_state = RenderState::default();

    loop {
        // Draw with current state
        terminal.draw(|f| draw_ui(f, &current_state))?;

        // Poll for events with timeout
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if let Some(event) = key_to_ui_event(key, current_state.key_context()) {
                    if matches!(event, UiEvent::Quit) {
                        let _ = ui_tx.send(event);
                        break;
                    }
                    let _ = ui_tx.send(event);
                }
            }
        }

        // Check for state updates (non-blocking)
        while let Ok(state) = render_rx.try_recv() {
            current_state = state;
        }
    }

    Ok(())
}

// ============================================================================
// UI Drawing Functions
// ============================================================================

fn draw_ui(f: &mut Frame, state: &RenderState) {
    let area = f.area();

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    draw_title_bar(f, state, main_chunks[0]);

    match state.screen {
        Screen::Login => draw_login(f, state, main_chunks[1]),
        Screen::SignUp => draw_sign_up(f, state, main_chunks[1]),
        Screen::Patients => draw_patients(f, state, main_chunks[1]),
        Screen::PatientDetail => draw_patient_detail(f, state, main_chunks[1]),
        Screen::PatientForm => draw_patient_form(f, state, main_chunks[1]),
        Screen::Sncr => draw_sncr(f, state, main_chunks[1]),
        Screen::Documents => draw_documents(f, state, main_chunks[1]),
    }

    draw_status_bar(f, state, main_chunks[2]);

    // Popups
    if let Some(patient_id) = state.confirm_delete {
        draw_confirm_delete_popup(f, patient_id, area);
    }
    if state.record_form.is_some() {
        draw_record_form_popup(f, state, area);
    }
    if state.upload_prompt.is_some() {
        draw_upload_prompt_popup(f, state, area);
    }
    if state.show_instructions {
        draw_instructions_popup(f, area);
    }
    if state.show_help {
        draw_help_popup(f, state.screen, area);
    }
}

fn draw_title_bar(f: &mut Frame, state: &RenderState, area: Rect) {
    let mut spans = vec![Span::styled(
        " Prontuário Eletrônico ",
        Style::default().fg(Color::Black).bg(Color::Cyan).bold(),
    )];
    if let Some(session) = &state.session {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("{} ({})", session.full_name, session.role.label()),
            Style::default().fg(Color::Gray),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_login(f: &mut Frame, state: &RenderState, area: Rect) {
    let popup_area = centered_rect(40, 50, area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Heading
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(popup_area);

    let heading = Paragraph::new("Login").style(Style::default().fg(Color::Cyan).bold());
    f.render_widget(heading, chunks[0]);

    draw_form_fields(f, &state.login, &chunks[1..3]);
}

fn draw_sign_up(f: &mut Frame, state: &RenderState, area: Rect) {
    let popup_area = centered_rect(50, 90, area);
    let mut constraints = vec![Constraint::Length(2)];
    constraints.extend(std::iter::repeat(Constraint::Length(3)).take(state.sign_up.fields.len()));
    constraints.push(Constraint::Min(0));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(popup_area);

    let heading =
        Paragraph::new("Cadastro de Médico").style(Style::default().fg(Color::Cyan).bold());
    f.render_widget(heading, chunks[0]);

    draw_form_fields(f, &state.sign_up, &chunks[1..=state.sign_up.fields.len()]);
}

fn draw_patient_form(f: &mut Frame, state: &RenderState, area: Rect) {
    let Some(pf) = &state.patient_form else {
        return;
    };

    let title = if pf.editing.is_some() {
        "Editar Paciente"
    } else {
        "Adicionar Novo Paciente"
    };

    // Two columns of seven fields each
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let mut left = vec![Constraint::Length(2)];
    left.extend(std::iter::repeat(Constraint::Length(3)).take(7));
    left.push(Constraint::Min(0));
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(left)
        .split(columns[0]);

    let mut right = vec![Constraint::Length(2)];
    right.extend(std::iter::repeat(Constraint::Length(3)).take(7));
    right.push(Constraint::Min(0));
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(right)
        .split(columns[1]);

    let heading = Paragraph::new(title).style(Style::default().fg(Color::Cyan).bold());
    f.render_widget(heading, left_chunks[0]);

    for (index, field) in pf.form.fields.iter().enumerate() {
        let chunk = if index < 7 {
            left_chunks[index + 1]
        } else {
            right_chunks[index - 7 + 1]
        };
        draw_one_field(f, &pf.form, index, field, chunk);
    }
}

/// Draw consecutive form fields into the given chunks, cursor included
fn draw_form_fields(f: &mut Frame, form: &app::state::TextForm, chunks: &[Rect]) {
    for (index, field) in form.fields.iter().enumerate() {
        if let Some(chunk) = chunks.get(index) {
            draw_one_field(f, form, index, field, *chunk);
        }
    }
}

fn draw_one_field(
    f: &mut Frame,
    form: &app::state::TextForm,
    index: usize,
    field: &app::state::FormField,
    area: Rect,
) {
    let is_active = form.active == index;
    let display = if field.masked {
        "*".repeat(field.value.chars().count())
    } else {
        field.value.clone()
    };

    let border_style = if is_active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(format!(" {} ", field.label));
    f.render_widget(Paragraph::new(display).block(block), area);

    if is_active {
        let max_x = area.x + area.width.saturating_sub(2);
        let cursor_x = (area.x + form.cursor as u16 + 1).min(max_x);
        f.set_cursor_position(Position::new(cursor_x, area.y + 1));
    }
}

fn draw_patients(f: &mut Frame, state: &RenderState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Filter
            Constraint::Length(1), // Column header
            Constraint::Min(1),    // Table
        ])
        .split(area);

    let filter_active = state.input_mode == InputMode::Editing;
    let filter = render_input(
        &state.roster_filter,
        "Filtrar por nome ou CPF (/)",
        filter_active,
        filter_active,
    );
    f.render_widget(filter, chunks[0]);
    if filter_active {
        let max_x = chunks[0].x + chunks[0].width.saturating_sub(2);
        let cursor_x = (chunks[0].x + state.filter_cursor as u16 + 1).min(max_x);
        f.set_cursor_position(Position::new(cursor_x, chunks[0].y + 1));
    }

    let header = Paragraph::new(format!(
        "  {:<30} {:<18} {:<15}",
        "Nome", "CPF", "Telefone"
    ))
    .style(Style::default().fg(Color::DarkGray));
    f.render_widget(header, chunks[1]);

    let filtered = app::state::filter_patients(&state.patients, &state.roster_filter);
    let items: Vec<ListItem> = filtered
        .iter()
        .map(|p| {
            ListItem::new(format!(
                "{:<30} {:<18} {:<15}",
                p.user.full_name(),
                p.cpf,
                p.phone
            ))
        })
        .collect();

    if items.is_empty() {
        let message = if state.is_loading {
            "Carregando..."
        } else {
            "Nenhum paciente encontrado."
        };
        let empty = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(" Lista de Pacientes "));
        f.render_widget(empty, chunks[2]);
        return;
    }

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Lista de Pacientes "))
        .highlight_style(Style::default().fg(Color::Yellow).bold())
        .highlight_symbol("> ");

    let mut list_state = ListState::default();
    list_state.select(Some(state.selected_patient));
    f.render_stateful_widget(list, chunks[2], &mut list_state);
}

fn draw_patient_detail(f: &mut Frame, state: &RenderState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Patient card
            Constraint::Min(1),    // Record entries
        ])
        .split(area);

    let Some(patient) = &state.detail_patient else {
        let message = if state.is_loading {
            "Carregando..."
        } else {
            "Paciente não encontrado."
        };
        let empty = Paragraph::new(message).style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, chunks[0]);
        return;
    };

    let card_lines = vec![
        Line::from(Span::styled(
            patient.user.full_name(),
            Style::default().bold(),
        )),
        Line::from(format!("CPF: {}", patient.cpf)),
        Line::from(format!("Telefone: {}", patient.phone)),
        Line::from(format!("Endereço: {}", patient.address.summary())),
    ];
    let card = Paragraph::new(card_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Detalhes do Paciente "),
    );
    f.render_widget(card, chunks[0]);

    let items = detail_list_items(patient);
    if items.is_empty() {
        let empty = Paragraph::new("Sem entradas no prontuário. Pressione 'n' para criar a primeira.")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(" Prontuário "));
        f.render_widget(empty, chunks[1]);
        return;
    }

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Prontuário "))
        .highlight_symbol("> ");

    let mut list_state = ListState::default();
    list_state.select(Some(state.selected_row));
    f.render_stateful_widget(list, chunks[1], &mut list_state);
}

/// One list item per detail row, in the exact order of `detail_rows`
fn detail_list_items(patient: &Patient) -> Vec<ListItem<'static>> {
    let mut items = Vec::new();
    for record in &patient.medical_records {
        items.push(ListItem::new(Line::from(Span::styled(
            format!("Entrada de {}", record.created_at.format("%d/%m/%Y")),
            Style::default().fg(Color::Cyan).bold(),
        ))));

        for prescription in &record.prescriptions {
            let status_style = if prescription.is_signed {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Yellow)
            };
            let mut spans = vec![
                Span::styled(
                    format!("  [{}] ", prescription.prescription_type.label()),
                    Style::default().fg(Color::Magenta),
                ),
                Span::raw(prescription.description.clone()),
            ];
            if let Some(number) = &prescription.sncr_number {
                spans.push(Span::styled(
                    format!("  Nº SNCR: {}", number),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            spans.push(Span::styled(
                format!(
                    "  {}",
                    signature_summary(
                        prescription.is_signed,
                        prescription.signed_by.as_ref(),
                        prescription.signed_at,
                    )
                ),
                status_style,
            ));
            items.push(ListItem::new(Line::from(spans)));
        }

        for procedure in &record.procedures {
            let status_style = if procedure.is_signed {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Yellow)
            };
            let spans = vec![
                Span::styled("  [Procedimento] ", Style::default().fg(Color::Blue)),
                Span::raw(procedure.description.clone()),
                Span::styled(
                    format!(
                        "  {}",
                        signature_summary(
                            procedure.is_signed,
                            procedure.signed_by.as_ref(),
                            procedure.signed_at,
                        )
                    ),
                    status_style,
                ),
            ];
            items.push(ListItem::new(Line::from(spans)));
        }
    }
    items
}

fn draw_sncr(f: &mut Frame, state: &RenderState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Numbers input
            Constraint::Length(1), // Filter / submit line
            Constraint::Min(1),    // Table
        ])
        .split(area);

    let editing = state.input_mode == InputMode::Editing;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(if editing {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        })
        .title(" Números de Receita, um por linha (e: editar) ");
    let input = Paragraph::new(state.sncr.input.as_str())
        .block(input_block)
        .wrap(Wrap { trim: false });
    f.render_widget(input, chunks[0]);

    let filter_label = match state.sncr.filter {
        Some(kind) => kind.label(),
        None => "Todos os Tipos",
    };
    let submit_style = if state.sncr.can_submit() {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let filter_line = Line::from(vec![
        Span::raw(format!(" Tipo de Receita: {} ", filter_label)),
        Span::styled("(f: alternar) ", Style::default().fg(Color::DarkGray)),
        Span::styled("[a] Adicionar", submit_style),
    ]);
    f.render_widget(Paragraph::new(filter_line), chunks[1]);

    let filtered = state.sncr.filtered();
    let items: Vec<ListItem> = filtered
        .iter()
        .map(|number| {
            ListItem::new(Line::from(vec![
                Span::raw(format!("{:<22} ", number.number)),
                Span::raw(format!("{:<50} ", number.prescription_type.label())),
                Span::styled(
                    format!("{:<12} ", number.status.label()),
                    Style::default().fg(sncr_status_color(number.status)),
                ),
                Span::styled(
                    number.created_at.format("%d/%m/%Y").to_string(),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    if items.is_empty() {
        let message = if state.is_loading {
            "Carregando..."
        } else {
            "Nenhum número cadastrado para este tipo."
        };
        let empty = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(" Meus Números "));
        f.render_widget(empty, chunks[2]);
        return;
    }

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Meus Números "))
        .highlight_style(Style::default().fg(Color::Yellow))
        .highlight_symbol("> ");

    let mut list_state = ListState::default();
    list_state.select(Some(state.sncr.selected));
    f.render_stateful_widget(list, chunks[2], &mut list_state);
}

fn draw_documents(f: &mut Frame, state: &RenderState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Patient card
            Constraint::Length(1), // Column header
            Constraint::Min(1),    // Table
        ])
        .split(area);

    let Some(payload) = &state.documents.payload else {
        let message = if state.is_loading {
            "Carregando..."
        } else {
            "Nenhum paciente encontrado."
        };
        f.render_widget(
            Paragraph::new(message).style(Style::default().fg(Color::DarkGray)),
            chunks[0],
        );
        return;
    };

    let card_lines = vec![
        Line::from(Span::styled(
            payload.patient.user.full_name(),
            Style::default().bold(),
        )),
        Line::from(format!("CPF: {}", payload.patient.cpf)),
        Line::from(format!("Telefone: {}", payload.patient.phone)),
    ];
    let card = Paragraph::new(card_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Meus Documentos "),
    );
    f.render_widget(card, chunks[0]);

    let header = Paragraph::new(format!(
        "  {:<14} {:<40} {:<12} {}",
        "Tipo", "Descrição", "Assinatura", "Médico"
    ))
    .style(Style::default().fg(Color::DarkGray));
    f.render_widget(header, chunks[1]);

    let items: Vec<ListItem> = payload
        .documents
        .iter()
        .map(|doc| {
            let signed_at = doc
                .signed_at
                .map(|at| at.format("%d/%m/%Y").to_string())
                .unwrap_or_else(|| "-".to_string());
            let doctor = match &doc.doctor_crm {
                Some(crm) => format!("{} (CRM: {})", doc.doctor_name, crm),
                None => doc.doctor_name.clone(),
            };
            ListItem::new(format!(
                "{:<14} {:<40} {:<12} {}",
                doc.doc_type, doc.description, signed_at, doctor
            ))
        })
        .collect();

    if items.is_empty() {
        let empty = Paragraph::new("Nenhum documento assinado.")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(" Documentos Assinados "));
        f.render_widget(empty, chunks[2]);
        return;
    }

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Documentos Assinados (Enter: baixar) "),
        )
        .highlight_style(Style::default().fg(Color::Yellow).bold())
        .highlight_symbol("> ");

    let mut list_state = ListState::default();
    list_state.select(Some(state.documents.selected));
    f.render_stateful_widget(list, chunks[2], &mut list_state);
}

fn draw_status_bar(f: &mut Frame, state: &RenderState, area: Rect) {
    if let Some(notice) = &state.notice {
        let bar = Paragraph::new(format!(" {} ", notice.text))
            .style(Style::default().fg(notice_color(notice.level)));
        f.render_widget(bar, area);
        return;
    }

    let status = if state.is_loading {
        " Carregando... "
    } else {
        match state.screen {
            Screen::Login => " Enter:entrar | Tab:campo | Ctrl+R:cadastro de médico | Esc:sair ",
            Screen::SignUp => " Enter:cadastrar | Tab:campo | Esc:voltar ",
            Screen::Patients => {
                " Enter:detalhes | a:adicionar | e:editar | d:excluir | /:filtrar | g:SNCR | l:encerrar sessão | ?:ajuda | q:sair "
            }
            Screen::PatientDetail => {
                " n:nova entrada | r:receita | p:procedimento | d:baixar p/ assinar | u:enviar assinado | s:PDF assinado | e:editar | Esc:voltar "
            }
            Screen::PatientForm => " Enter:salvar | Tab:campo | Esc:cancelar ",
            Screen::Sncr => " e:editar | f:tipo | a:adicionar | r:atualizar | Esc:voltar ",
            Screen::Documents => " Enter:baixar | r:atualizar | l:encerrar sessão | q:sair ",
        }
    };

    let bar = Paragraph::new(status).style(Style::default().fg(Color::DarkGray));
    f.render_widget(bar, area);
}

fn draw_confirm_delete_popup(f: &mut Frame, patient_id: u64, area: Rect) {
    let popup_area = centered_rect(50, 20, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Excluir Paciente ")
        .style(Style::default().bg(Color::Black));

    let text = format!(
        "Excluir o paciente #{} e todo o seu prontuário?\n\ny: confirmar    n/Esc: cancelar",
        patient_id
    );
    let popup = Paragraph::new(text).block(block).wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(popup, popup_area);
}

fn draw_record_form_popup(f: &mut Frame, state: &RenderState, area: Rect) {
    let Some(form) = &state.record_form else {
        return;
    };
    let popup_area = centered_rect(60, 50, area);

    let title = match form.kind {
        DocumentKind::Prescription => " Adicionar Receita (Enter salva, Esc cancela) ",
        DocumentKind::Procedure => " Adicionar Procedimento (Enter salva, Esc cancela) ",
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .style(Style::default().bg(Color::Black));
    f.render_widget(Clear, popup_area);
    f.render_widget(block, popup_area);

    let inner = popup_area.inner(Margin::new(1, 1));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Description
            Constraint::Length(3), // Type
            Constraint::Length(3), // Acquirer name
            Constraint::Length(3), // Acquirer document
            Constraint::Min(0),
        ])
        .split(inner);

    use app::state::RecordField;

    let description = render_input(
        &form.description,
        "Descrição",
        form.field == RecordField::Description,
        true,
    );
    f.render_widget(description, chunks[0]);
    if form.field == RecordField::Description {
        let max_x = chunks[0].x + chunks[0].width.saturating_sub(2);
        let cursor_x = (chunks[0].x + form.cursor as u16 + 1).min(max_x);
        f.set_cursor_position(Position::new(cursor_x, chunks[0].y + 1));
    }

    if form.kind == DocumentKind::Prescription {
        let type_block = Block::default()
            .borders(Borders::ALL)
            .border_style(if form.field == RecordField::Type {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            })
            .title(" Tipo de Receita (qualquer tecla alterna) ");
        f.render_widget(
            Paragraph::new(form.prescription_type.label()).block(type_block),
            chunks[1],
        );

        if form.prescription_type.is_controlled() {
            let acquirer = render_input(
                &form.acquirer_name,
                "Nome do Adquirente",
                form.field == RecordField::AcquirerName,
                true,
            );
            f.render_widget(acquirer, chunks[2]);
            if form.field == RecordField::AcquirerName {
                let max_x = chunks[2].x + chunks[2].width.saturating_sub(2);
                let cursor_x = (chunks[2].x + form.cursor as u16 + 1).min(max_x);
                f.set_cursor_position(Position::new(cursor_x, chunks[2].y + 1));
            }

            let document = render_input(
                &form.acquirer_document,
                "Documento do Adquirente",
                form.field == RecordField::AcquirerDocument,
                true,
            );
            f.render_widget(document, chunks[3]);
            if form.field == RecordField::AcquirerDocument {
                let max_x = chunks[3].x + chunks[3].width.saturating_sub(2);
                let cursor_x = (chunks[3].x + form.cursor as u16 + 1).min(max_x);
                f.set_cursor_position(Position::new(cursor_x, chunks[3].y + 1));
            }
        }
    }
}

fn draw_upload_prompt_popup(f: &mut Frame, state: &RenderState, area: Rect) {
    let Some(prompt) = &state.upload_prompt else {
        return;
    };
    let popup_area = centered_rect(60, 20, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(
            " Enviar {} Assinado(a) - Enter envia, Esc cancela ",
            prompt.kind.label()
        ))
        .style(Style::default().bg(Color::Black));

    let content = if prompt.path.is_empty() {
        "Caminho do arquivo PDF assinado...\n\nExemplo: ~/Downloads/assinado-receita.pdf"
    } else {
        &prompt.path
    };

    let input = Paragraph::new(content).block(block).wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(input, popup_area);
}

fn draw_instructions_popup(f: &mut Frame, area: Rect) {
    let popup_area = centered_rect(70, 70, area);

    let mut lines = vec![
        Line::from(Span::styled(
            "Próximos Passos para Assinar o Documento",
            Style::default().fg(Color::Cyan).bold(),
        )),
        Line::raw(""),
        Line::raw(
            "O PDF foi salvo na sua pasta de downloads. Siga as instruções abaixo para assinar digitalmente o documento e enviá-lo de volta.",
        ),
        Line::raw(""),
    ];
    for (index, (title, detail)) in SIGNING_STEPS.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(
                format!("{}. ", index + 1),
                Style::default().fg(Color::Cyan).bold(),
            ),
            Span::styled(*title, Style::default().bold()),
        ]));
        lines.push(Line::raw(format!("   {}", detail)));
        lines.push(Line::raw(""));
    }
    lines.push(Line::styled(
        "Pressione qualquer tecla para fechar...",
        Style::default().fg(Color::DarkGray),
    ));

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Assinatura Digital ")
        .style(Style::default().bg(Color::Black));

    let popup = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(popup, popup_area);
}

fn draw_help_popup(f: &mut Frame, screen: Screen, area: Rect) {
    let popup_area = centered_rect(60, 70, area);

    let help_text = match screen {
        Screen::Patients | Screen::PatientDetail => {
            r#"
 PRONTUI - Atalhos do Médico

 LISTA DE PACIENTES
   ↑ / ↓              Navegar
   Enter              Ver detalhes
   a                  Adicionar paciente
   e                  Editar paciente
   d                  Excluir paciente
   /                  Filtrar por nome ou CPF
   g                  Números de receita (SNCR)

 PRONTUÁRIO
   n                  Nova entrada
   r                  Adicionar receita
   p                  Adicionar procedimento
   d                  Baixar PDF para assinar
   u                  Enviar PDF assinado
   s                  Baixar PDF assinado

 GERAL
   l                  Encerrar sessão
   ?                  Esta ajuda
   q / Ctrl+C         Sair

 Pressione qualquer tecla para fechar...
"#
        }
        _ => {
            r#"
 PRONTUI - Atalhos

 NAVEGAÇÃO
   ↑ / ↓              Navegar / trocar campo
   Tab / Shift+Tab    Próximo / campo anterior
   Enter              Confirmar / baixar
   Esc                Voltar / cancelar

 GERAL
   r                  Atualizar
   l                  Encerrar sessão
   ?                  Esta ajuda
   q / Ctrl+C         Sair

 Pressione qualquer tecla para fechar...
"#
        }
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Ajuda ")
        .style(Style::default().bg(Color::Black));

    let help = Paragraph::new(help_text).block(block).wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
