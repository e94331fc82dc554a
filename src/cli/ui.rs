use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, Tabs, Wrap},
    Frame,
};

use crate::cli::state::{App, AuthMode, EditField, Tab};
use crate::error::FieldErrors;
use crate::forms::goal::GOAL_CATEGORIES;
use crate::models::{Money, TxnKind};
use crate::util::{self, fmt_money, fmt_percent};
use crate::views::budgets::{BudgetStatus, BudgetUsage};
use crate::views::goals::GoalProgress;
use crate::views::{LoadStatus, Origin};

pub fn draw(f: &mut Frame, app: &mut App) {
    let size = f.size();

    if app.tab == Tab::Auth {
        let root = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(10), Constraint::Length(1)])
            .split(size);
        draw_auth(f, root[0], app);
        f.render_widget(Paragraph::new(app.status.as_str()), root[1]);
        return;
    }

    // top tabs | main content | status line
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(1)])
        .split(size);

    let titles = Tab::MAIN
        .iter()
        .enumerate()
        .map(|(i, t)| Line::from(Span::raw(format!("{} {}", i + 1, t.title()))))
        .collect::<Vec<_>>();
    let selected = Tab::MAIN.iter().position(|t| *t == app.tab).unwrap_or(0);
    let user = app
        .session()
        .user()
        .map(|u| u.display_name().to_string())
        .unwrap_or_default();
    let tabs = Tabs::new(titles)
        .select(selected)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Finance Tracker  [{user}]")),
        )
        .highlight_style(Style::default().add_modifier(Modifier::BOLD));
    f.render_widget(tabs, root[0]);

    match app.tab {
        Tab::Dashboard => draw_dashboard(f, root[1], app),
        Tab::Transactions => draw_txns(f, root[1], app),
        Tab::AddTxn => draw_add_txn(f, root[1], app),
        Tab::Budgets => draw_budgets(f, root[1], app),
        Tab::Goals => draw_goals(f, root[1], app),
        Tab::Help | Tab::Auth => draw_help(f, root[1]),
    }

    f.render_widget(Paragraph::new(app.status.as_str()), root[2]);
}

fn title_with(base: &str, status: &LoadStatus, origin: Origin) -> String {
    let suffix = match (status, origin) {
        (LoadStatus::Loading, _) => " (loading…)",
        (_, Origin::Placeholder) => " (demo data, backend unreachable)",
        (LoadStatus::Failed(_), _) => " (failed, r to retry)",
        _ => "",
    };
    format!("{base}{suffix}")
}

fn signed(kind: TxnKind, amount: &Money) -> String {
    match kind {
        TxnKind::Income => format!("+{}", fmt_money(amount)),
        TxnKind::Expense => format!("-{}", fmt_money(amount)),
        TxnKind::Transfer => fmt_money(amount),
    }
}

fn error_lines(errors: &FieldErrors, error: Option<&str>) -> Vec<String> {
    let mut lines: Vec<String> = errors.iter().map(|(_, msg)| format!("! {msg}")).collect();
    if let Some(err) = error {
        lines.push(format!("! {err}"));
    }
    lines
}

// Sign in

fn draw_auth(f: &mut Frame, area: Rect, app: &App) {
    let auth = &app.auth;
    let box_area = center_rect(area, 60, 14);
    f.render_widget(Clear, box_area);

    let marker = |idx: usize| if auth.focus == idx { "> " } else { "  " };
    let mut lines = Vec::new();
    let mut idx = 0;
    if auth.mode == AuthMode::Register {
        lines.push(format!("{}Name     : {}", marker(idx), auth.name.rendered()));
        idx += 1;
    }
    lines.push(format!("{}Email    : {}", marker(idx), auth.email.rendered()));
    idx += 1;
    lines.push(format!("{}Password : {}", marker(idx), auth.password.rendered()));
    lines.push(String::new());
    lines.push("Tab: next field | Enter: submit | Ctrl+t: switch sign in/register | Esc: quit".into());
    if auth.pending {
        lines.push("Contacting server…".into());
    }
    if let Some(err) = &auth.error {
        lines.push(format!("! {err}"));
    }

    let title = match auth.mode {
        AuthMode::Login => "Sign in",
        AuthMode::Register => "Create account",
    };
    let p = Paragraph::new(lines.join("\n"))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, box_area);
}

// Dashboard

fn draw_dashboard(f: &mut Frame, area: Rect, app: &App) {
    let view = &app.dashboard;
    let title = title_with(
        &format!("Overview: {} (p to change period)", view.period().as_str()),
        view.status(),
        view.origin(),
    );

    let Some(data) = view.data() else {
        let msg = match view.status() {
            LoadStatus::Failed(err) => format!("Could not load dashboard: {err}\nPress r to retry."),
            _ => "Loading…".into(),
        };
        f.render_widget(
            Paragraph::new(msg).block(Block::default().borders(Borders::ALL).title(title)),
            area,
        );
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(5)])
        .split(area);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    let m = &data.dashboard.monthly_summary;
    let t = &data.dashboard.total_summary;
    let summary = vec![
        format!("Income       : {}", fmt_money(&m.income)),
        format!("Expenses     : {}", fmt_money(&m.expenses)),
        format!("Savings      : {}", fmt_money(&m.savings)),
        format!("Savings rate : {}", fmt_percent(&m.savings_rate)),
        format!("Net worth    : {}", fmt_money(&t.net_worth)),
    ]
    .join("\n");
    f.render_widget(
        Paragraph::new(summary).block(Block::default().borders(Borders::ALL).title(title)),
        rows[0],
    );

    let items: Vec<ListItem> = view
        .category_shares()
        .into_iter()
        .map(|(slice, share)| {
            ListItem::new(format!(
                "{:<20} {:>12}  {:>7}",
                slice.name,
                fmt_money(&slice.amount),
                fmt_percent(&share)
            ))
        })
        .collect();
    f.render_widget(
        List::new(items).block(Block::default().borders(Borders::ALL).title("Spending by category")),
        cols[0],
    );

    let header = Row::new(vec!["Month", "Income", "Expenses"]).height(1);
    let body: Vec<Row> = data
        .trends
        .monthly_trends
        .iter()
        .map(|(month, point)| {
            Row::new(vec![
                Cell::from(month.clone()),
                Cell::from(fmt_money(&point.income)),
                Cell::from(fmt_money(&point.expenses)),
            ])
        })
        .collect();
    let widths = [Constraint::Length(10), Constraint::Length(14), Constraint::Length(14)];
    let table = Table::new(body, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Last {} months", data.trends.period_months)),
    );
    f.render_widget(table, cols[1]);
}

// Transactions

fn draw_txns(f: &mut Frame, area: Rect, app: &mut App) {
    let view = &app.txns.view;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(5)])
        .split(area);

    let totals = view.totals();
    let kind = view.filter.kind.map_or("all", |k| k.as_str());
    let search = if app.txns.searching {
        format!("{}_", view.filter.search)
    } else {
        view.filter.search.clone()
    };
    let header_text = vec![
        format!(
            "Income {}   Expenses {}   Net {}",
            fmt_money(&totals.income),
            fmt_money(&totals.expenses),
            fmt_money(&totals.net())
        ),
        format!(
            "Search: [{search}]  Type: {kind}  Sort: {:?} {:?}   (/ search, f type, s sort, o order)",
            view.filter.sort, view.filter.order
        ),
    ]
    .join("\n");
    f.render_widget(
        Paragraph::new(header_text).block(Block::default().borders(Borders::ALL).title("Summary")),
        rows[0],
    );

    let header = Row::new(vec!["Date", "Description", "Category", "Amount"]).height(1);
    let body: Vec<Row> = view
        .visible()
        .into_iter()
        .map(|t| {
            let style = match t.r#type {
                TxnKind::Income => Style::default().fg(Color::Green),
                TxnKind::Expense => Style::default().fg(Color::Red),
                TxnKind::Transfer => Style::default(),
            };
            Row::new(vec![
                Cell::from(util::iso(&t.date.date())),
                Cell::from(t.description.clone().unwrap_or_default()),
                Cell::from(
                    view.category_name(t.category_id.as_deref())
                        .unwrap_or("-")
                        .to_string(),
                ),
                Cell::from(signed(t.r#type, &t.amount)).style(style),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(12),
        Constraint::Percentage(50),
        Constraint::Length(18),
        Constraint::Length(14),
    ];

    let title = title_with(
        "Transactions (a add, x delete, r refresh)",
        view.status(),
        view.origin(),
    );
    let table = Table::new(body, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    f.render_stateful_widget(table, rows[1], &mut app.txns.sel);
}

// Add Transaction

fn draw_add_txn(f: &mut Frame, area: Rect, app: &mut App) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(9)])
        .split(cols[0]);

    let add = &app.add;
    let form = &add.form;
    let mark = |field: EditField| if add.editing == Some(field) { "  <editing>" } else { "" };
    let category = app
        .txns
        .view
        .category_name(Some(form.category_id.as_str()))
        .unwrap_or("<none>");

    let form_lines = vec![
        format!("Type        : {}   (t to switch)", form.kind().label()),
        format!("Amount      : {}{}", form.amount, mark(EditField::Amount)),
        format!("Description : {}{}", form.description, mark(EditField::Description)),
        format!("Category    : {category}   (Up/Down)"),
        format!("Date        : {}{}", form.date, mark(EditField::Date)),
    ]
    .join("\n");
    f.render_widget(
        Paragraph::new(form_lines).block(Block::default().borders(Borders::ALL).title("Add Transaction")),
        left_chunks[0],
    );

    let mut help_lines = vec![
        "a/e/d: edit Amount/Description/Date".to_string(),
        "Tab: next field | Enter: stop editing".into(),
        "s: Save | Esc: back to list".into(),
        String::new(),
    ];
    help_lines.extend(error_lines(&add.errors, None));
    if let Some(message) = &add.message {
        help_lines.push(message.clone());
    }
    let help_p = Paragraph::new(help_lines.join("\n"))
        .block(Block::default().borders(Borders::ALL).title("Help & Status"))
        .wrap(Wrap { trim: true });
    f.render_widget(help_p, left_chunks[1]);

    let items: Vec<ListItem> = form
        .categories_for(app.txns.view.categories())
        .into_iter()
        .map(|c| ListItem::new(Line::from(format!("{}  {}", c.icon.as_deref().unwrap_or(""), c.name))))
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Categories"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    f.render_stateful_widget(list, cols[1], &mut app.add.cat_sel);
}

// Budgets

fn draw_budgets(f: &mut Frame, area: Rect, app: &mut App) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    let view = &app.budgets.view;
    let items: Vec<ListItem> = view
        .budgets()
        .iter()
        .map(|b| {
            let usage = BudgetUsage::of(b);
            let color = match usage.status {
                BudgetStatus::OnTrack => Color::Green,
                BudgetStatus::Warning => Color::Yellow,
                BudgetStatus::Exceeded => Color::Red,
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{:<20} {:<8} ", b.name, b.period.as_str())),
                Span::raw(format!("{} / {}  ", fmt_money(&b.spent), fmt_money(&b.amount))),
                Span::styled(
                    format!("{} {}", fmt_percent(&usage.percent), usage.status.label()),
                    Style::default().fg(color),
                ),
            ]))
        })
        .collect();

    let title = title_with("Budgets (n new, x delete, r refresh)", view.status(), Origin::Server);
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let totals = view.totals();
    let mut details = vec![
        format!("Budgeted   : {}", fmt_money(&totals.budgeted)),
        format!("Spent      : {}", fmt_money(&totals.spent)),
        format!("Remaining  : {}", fmt_money(&totals.remaining())),
        format!("Utilization: {}", fmt_percent(&totals.utilization())),
    ];
    if let Some(b) = app.budgets.sel.selected().and_then(|i| view.budgets().get(i)) {
        let usage = BudgetUsage::of(b);
        details.push(String::new());
        details.push(b.name.clone());
        details.push(format!(
            "Category   : {}",
            view.category_name(b.category_id.as_deref()).unwrap_or("all")
        ));
        details.push(format!("Remaining  : {}", fmt_money(&usage.remaining)));
    }
    if let LoadStatus::Failed(err) = view.status() {
        details.push(String::new());
        details.push(format!("! {err}"));
    }
    let right = Paragraph::new(details.join("\n"))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Totals"));

    f.render_stateful_widget(list, cols[0], &mut app.budgets.sel);
    f.render_widget(right, cols[1]);

    if let Some(modal) = &app.budgets.modal {
        let area = center_rect(area, 60, 14);
        f.render_widget(Clear, area);
        let mark = |i: usize| if modal.focus == i { "> " } else { "  " };
        let category = app
            .budgets
            .view
            .category_name(Some(modal.form.category_id.as_str()))
            .unwrap_or("all categories");
        let mut lines = vec![
            format!("{}Name     : {}", mark(0), modal.form.name),
            format!("{}Amount   : {}", mark(1), modal.form.amount),
            format!("{}Period   : {}  (Left/Right)", mark(2), modal.form.period.as_str()),
            format!("{}Category : {}  (Left/Right)", mark(3), category),
            String::new(),
            "Tab: next field | Enter: create | Esc: cancel".into(),
        ];
        lines.extend(error_lines(&modal.errors, modal.error.as_deref()));
        let p = Paragraph::new(lines.join("\n"))
            .block(Block::default().borders(Borders::ALL).title("New Budget"));
        f.render_widget(p, area);
    }
}

// Goals

fn draw_goals(f: &mut Frame, area: Rect, app: &mut App) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let today = util::today();
    let view = &app.goals.view;
    let items: Vec<ListItem> = view
        .goals()
        .iter()
        .map(|g| {
            let progress = GoalProgress::of(g, today);
            let status = format!("{:?}", g.status).to_lowercase();
            ListItem::new(format!(
                "{:<22} {:>7}  {} / {}  [{status}]",
                g.title,
                fmt_percent(&progress.percent),
                fmt_money(&g.current_amount),
                fmt_money(&g.target_amount),
            ))
        })
        .collect();

    let title = title_with(
        "Goals (n new, p add progress, x delete)",
        view.status(),
        Origin::Server,
    );
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let totals = view.totals();
    let mut details = vec![
        format!("Active goals   : {}", view.active().count()),
        format!("Completed      : {}", view.completed().count()),
        format!("Total target   : {}", fmt_money(&totals.target)),
        format!("Total saved    : {}", fmt_money(&totals.saved)),
        format!("Overall        : {}", fmt_percent(&totals.progress())),
    ];
    if let Some(goal) = app.selected_goal() {
        let progress = GoalProgress::of(goal, today);
        details.push(String::new());
        details.push(goal.title.clone());
        if !goal.description.is_empty() {
            details.push(goal.description.clone());
        }
        details.push(format!("Remaining      : {}", fmt_money(&progress.remaining)));
        details.push(format!("Target date    : {}", util::iso(&goal.target_date)));
        details.push(if progress.days_remaining >= 0 {
            format!("Days left      : {}", progress.days_remaining)
        } else {
            format!("Overdue by     : {} days", -progress.days_remaining)
        });
    }
    if let Some(edit) = &app.goals.progress {
        details.push(String::new());
        details.push(format!("Add amount: {}_  (Enter save, Esc cancel)", edit.rendered()));
    }
    let right = Paragraph::new(details.join("\n"))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Progress"));

    f.render_stateful_widget(list, cols[0], &mut app.goals.sel);
    f.render_widget(right, cols[1]);

    if let Some(modal) = &app.goals.modal {
        let area = center_rect(area, 64, 15);
        f.render_widget(Clear, area);
        let mark = |i: usize| if modal.focus == i { "> " } else { "  " };
        let category = GOAL_CATEGORIES
            .iter()
            .find(|(value, _)| *value == modal.form.category)
            .map_or(modal.form.category.as_str(), |(_, label)| *label);
        let mut lines = vec![
            format!("{}Title       : {}", mark(0), modal.form.title),
            format!("{}Description : {}", mark(1), modal.form.description),
            format!("{}Target      : {}", mark(2), modal.form.target_amount),
            format!("{}Target date : {}  (YYYY-MM-DD)", mark(3), modal.form.target_date),
            format!("{}Category    : {}  (Left/Right)", mark(4), category),
            String::new(),
            "Tab: next field | Enter: create | Esc: cancel".into(),
        ];
        lines.extend(error_lines(&modal.errors, modal.error.as_deref()));
        let p = Paragraph::new(lines.join("\n"))
            .block(Block::default().borders(Borders::ALL).title("New Goal"));
        f.render_widget(p, area);
    }
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help_text = [
        "Global Keys:",
        "  q        : Quit",
        "  ?        : This help",
        "  1-6, Tab : Switch tabs",
        "  L        : Sign out",
        "",
        "Dashboard:",
        "  p        : Cycle period (month / quarter / year)",
        "  r        : Refresh",
        "",
        "Transactions:",
        "  Up/Down  : Navigate",
        "  /        : Search by description",
        "  f s o    : Filter type, sort key, sort order",
        "  a        : Add transaction",
        "  x/Del    : Delete selected",
        "",
        "Add Transaction:",
        "  a e d    : Edit Amount / Description / Date",
        "  t        : Toggle Expense/Income",
        "  Up/Down  : Choose category",
        "  s        : Save",
        "",
        "Budgets / Goals:",
        "  n        : New",
        "  x/Del    : Delete selected",
        "  p        : Add progress to selected goal",
    ]
    .join("\n");

    let p = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("Help & Keybindings"));

    f.render_widget(p, area);
}

fn center_rect(rect: Rect, w: u16, h: u16) -> Rect {
    let x = rect.x + rect.width.saturating_sub(w) / 2;
    let y = rect.y + rect.height.saturating_sub(h) / 2;
    Rect {
        x,
        y,
        width: w.min(rect.width),
        height: h.min(rect.height),
    }
}
