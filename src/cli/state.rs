use std::future::Future;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::widgets::{ListState, TableState};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::api::ApiClient;
use crate::cli::input::{edit_text, LineEdit};
use crate::error::{ClientError, FieldErrors};
use crate::forms::{AddTransactionForm, CreateBudgetForm, CreateGoalForm, SubmitGuard};
use crate::models::{BudgetDto, GoalDto, TransactionDto, TxnKind, User};
use crate::session::{RefreshOutcome, SessionEvent, SessionStore};
use crate::util;
use crate::views::analytics::Analytics;
use crate::views::budgets::BudgetPage;
use crate::views::goals;
use crate::views::transactions::TxnPage;
use crate::views::{BudgetsView, DashboardView, GoalsView, Origin, SortKey, Ticket, TransactionsView};

/// Results of background tasks, delivered to the draw loop.
#[derive(Debug)]
pub enum AppEvent {
    SignedIn(Result<User, ClientError>),
    Refreshed(Result<RefreshOutcome, ClientError>),
    DashboardLoaded(Ticket, Result<Analytics, ClientError>),
    TxnsLoaded(Ticket, Result<TxnPage, ClientError>),
    BudgetsLoaded(Ticket, Result<BudgetPage, ClientError>),
    GoalsLoaded(Ticket, Result<Vec<GoalDto>, ClientError>),
    TxnCreated(Ticket, Result<TransactionDto, ClientError>),
    TxnDeleted(Ticket, String, Result<(), ClientError>),
    BudgetCreated(Ticket, Result<BudgetDto, ClientError>),
    BudgetDeleted(Ticket, String, Result<(), ClientError>),
    GoalCreated(Ticket, Result<GoalDto, ClientError>),
    GoalUpdated(Ticket, Result<GoalDto, ClientError>),
    GoalDeleted(Ticket, String, Result<(), ClientError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Auth,
    Dashboard,
    Transactions,
    AddTxn,
    Budgets,
    Goals,
    Help,
}

impl Tab {
    pub const MAIN: [Tab; 6] = [
        Tab::Dashboard,
        Tab::Transactions,
        Tab::AddTxn,
        Tab::Budgets,
        Tab::Goals,
        Tab::Help,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Auth => "Sign in",
            Tab::Dashboard => "Dashboard",
            Tab::Transactions => "Transactions",
            Tab::AddTxn => "Add Transaction",
            Tab::Budgets => "Budgets",
            Tab::Goals => "Goals",
            Tab::Help => "Help",
        }
    }

    /// The view whose data the tab shows; Add Transaction shares the list.
    fn section(&self) -> Section {
        match self {
            Tab::Dashboard => Section::Dashboard,
            Tab::Transactions | Tab::AddTxn => Section::Transactions,
            Tab::Budgets => Section::Budgets,
            Tab::Goals => Section::Goals,
            Tab::Auth | Tab::Help => Section::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Dashboard,
    Transactions,
    Budgets,
    Goals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

pub struct AuthPage {
    pub mode: AuthMode,
    pub name: LineEdit,
    pub email: LineEdit,
    pub password: LineEdit,
    pub focus: usize,
    pub error: Option<String>,
    pub pending: bool,
}

impl Default for AuthPage {
    fn default() -> Self {
        Self {
            mode: AuthMode::Login,
            name: LineEdit::default(),
            email: LineEdit::default(),
            password: LineEdit::password(),
            focus: 0,
            error: None,
            pending: false,
        }
    }
}

impl AuthPage {
    pub fn field_count(&self) -> usize {
        match self.mode {
            AuthMode::Login => 2,
            AuthMode::Register => 3,
        }
    }

    fn focused(&mut self) -> &mut LineEdit {
        match (self.mode, self.focus) {
            (AuthMode::Register, 0) => &mut self.name,
            (AuthMode::Register, 1) | (AuthMode::Login, 0) => &mut self.email,
            _ => &mut self.password,
        }
    }

    fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        };
        self.focus = 0;
        self.error = None;
    }
}

#[derive(Default)]
pub struct TxnsPage {
    pub view: TransactionsView,
    pub sel: TableState,
    pub searching: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    Amount,
    Description,
    Date,
}

impl EditField {
    fn next(self) -> Self {
        match self {
            Self::Amount => Self::Description,
            Self::Description => Self::Date,
            Self::Date => Self::Amount,
        }
    }
}

pub struct AddTxnPage {
    pub form: AddTransactionForm,
    pub guard: Arc<SubmitGuard>,
    pub editing: Option<EditField>,
    pub cat_sel: ListState,
    pub errors: FieldErrors,
    pub message: Option<String>,
}

impl Default for AddTxnPage {
    fn default() -> Self {
        Self {
            form: AddTransactionForm::new(util::today()),
            guard: Arc::new(SubmitGuard::new()),
            editing: None,
            cat_sel: ListState::default(),
            errors: FieldErrors::new(),
            message: None,
        }
    }
}

#[derive(Default)]
pub struct BudgetModal {
    pub form: CreateBudgetForm,
    /// 0 name, 1 amount, 2 period, 3 category
    pub focus: usize,
    pub errors: FieldErrors,
    pub error: Option<String>,
}

#[derive(Default)]
pub struct BudgetsPage {
    pub view: BudgetsView,
    pub sel: ListState,
    pub modal: Option<BudgetModal>,
    pub guard: Arc<SubmitGuard>,
}

#[derive(Default)]
pub struct GoalModal {
    pub form: CreateGoalForm,
    /// 0 title, 1 description, 2 target, 3 date, 4 category
    pub focus: usize,
    pub errors: FieldErrors,
    pub error: Option<String>,
}

#[derive(Default)]
pub struct GoalsPage {
    pub view: GoalsView,
    pub sel: ListState,
    pub modal: Option<GoalModal>,
    pub progress: Option<LineEdit>,
    pub guard: Arc<SubmitGuard>,
}

pub struct App {
    pub api: ApiClient,
    pub tab: Tab,
    pub status: String,
    pub quit: bool,
    pub auth: AuthPage,
    pub dashboard: DashboardView,
    pub txns: TxnsPage,
    pub add: AddTxnPage,
    pub budgets: BudgetsPage,
    pub goals: GoalsPage,
    tx: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(api: ApiClient, tx: UnboundedSender<AppEvent>) -> Self {
        Self {
            api,
            tab: Tab::Auth,
            status: "Press ? for help | q to quit".into(),
            quit: false,
            auth: AuthPage::default(),
            dashboard: DashboardView::new(),
            txns: TxnsPage::default(),
            add: AddTxnPage::default(),
            budgets: BudgetsPage::default(),
            goals: GoalsPage::default(),
            tx,
        }
    }

    pub fn session(&self) -> &SessionStore {
        self.api.session()
    }

    /// Opens the main screen if a session was restored, then re-validates it.
    pub fn start(&mut self) {
        if self.session().is_authenticated() {
            self.switch_tab(Tab::Dashboard);
        }
        let session = self.session().clone();
        self.spawn(async move { AppEvent::Refreshed(session.refresh().await) });
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            // Receiver gone means the UI is shutting down.
            let _ = tx.send(task.await);
        });
    }

    // ============= Navigation =============

    pub fn switch_tab(&mut self, tab: Tab) {
        if tab == self.tab {
            return;
        }
        let (from, to) = (self.tab.section(), tab.section());
        if from != to {
            self.unmount(from);
            self.mount(to);
        }
        self.tab = tab;
    }

    fn mount(&mut self, section: Section) {
        let api = self.api.clone();
        match section {
            Section::None => {}
            Section::Dashboard => {
                let ticket = self.dashboard.mount();
                let period = self.dashboard.period();
                self.spawn(async move {
                    AppEvent::DashboardLoaded(ticket, DashboardView::fetch(&api, period).await)
                });
            }
            Section::Transactions => {
                let ticket = self.txns.view.mount();
                self.spawn_txns_fetch(ticket);
            }
            Section::Budgets => {
                let ticket = self.budgets.view.mount();
                self.spawn(async move { AppEvent::BudgetsLoaded(ticket, BudgetsView::fetch(&api).await) });
            }
            Section::Goals => {
                let ticket = self.goals.view.mount();
                self.spawn(async move { AppEvent::GoalsLoaded(ticket, GoalsView::fetch(&api).await) });
            }
        }
    }

    fn unmount(&mut self, section: Section) {
        match section {
            Section::None => {}
            Section::Dashboard => self.dashboard.unmount(),
            Section::Transactions => self.txns.view.unmount(),
            Section::Budgets => self.budgets.view.unmount(),
            Section::Goals => self.goals.view.unmount(),
        }
    }

    fn reload(&mut self) {
        let api = self.api.clone();
        match self.tab.section() {
            Section::None => {}
            Section::Dashboard => {
                let ticket = self.dashboard.begin_load();
                let period = self.dashboard.period();
                self.spawn(async move {
                    AppEvent::DashboardLoaded(ticket, DashboardView::fetch(&api, period).await)
                });
            }
            Section::Transactions => {
                let ticket = self.txns.view.begin_load();
                self.spawn_txns_fetch(ticket);
            }
            Section::Budgets => {
                let ticket = self.budgets.view.begin_load();
                self.spawn(async move { AppEvent::BudgetsLoaded(ticket, BudgetsView::fetch(&api).await) });
            }
            Section::Goals => {
                let ticket = self.goals.view.begin_load();
                self.spawn(async move { AppEvent::GoalsLoaded(ticket, GoalsView::fetch(&api).await) });
            }
        }
    }

    fn spawn_txns_fetch(&self, ticket: Ticket) {
        let api = self.api.clone();
        let query = self.txns.view.query.clone();
        self.spawn(async move { AppEvent::TxnsLoaded(ticket, TransactionsView::fetch(&api, &query).await) });
    }

    /// Drops every view and returns to the sign-in screen.
    fn leave_main(&mut self) {
        self.unmount(self.tab.section());
        self.tab = Tab::Auth;
        self.add = AddTxnPage::default();
        self.budgets.modal = None;
        self.goals.modal = None;
        self.goals.progress = None;
        self.txns.searching = false;
    }

    // ============= Events =============

    pub fn on_session(&mut self, event: SessionEvent) {
        debug!(?event, "session event");
        if event == SessionEvent::SignedOut && self.tab != Tab::Auth {
            self.leave_main();
            self.status = "Signed out. Please sign in again.".into();
        }
    }

    pub fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::SignedIn(result) => {
                self.auth.pending = false;
                match result {
                    Ok(user) => {
                        self.auth = AuthPage::default();
                        self.status = format!("Welcome, {}", user.display_name());
                        self.switch_tab(Tab::Dashboard);
                    }
                    Err(err) => self.auth.error = Some(err.to_string()),
                }
            }
            AppEvent::Refreshed(result) => match result {
                Ok(RefreshOutcome::Validated(user)) => {
                    self.status = format!("Signed in as {}", user.display_name());
                }
                Ok(_) => {}
                Err(err) => self.status = format!("Session check failed: {err}"),
            },
            AppEvent::DashboardLoaded(ticket, result) => {
                self.dashboard.finish_load(ticket, result);
            }
            AppEvent::TxnsLoaded(ticket, result) => {
                if self.txns.view.finish_load(ticket, result) {
                    clamp_table(&mut self.txns.sel, self.txns.view.visible().len());
                    if self.txns.view.origin() == Origin::Placeholder {
                        self.status = "Backend unreachable: showing demo data".into();
                    }
                }
            }
            AppEvent::BudgetsLoaded(ticket, result) => {
                if self.budgets.view.finish_load(ticket, result) {
                    clamp_list(&mut self.budgets.sel, self.budgets.view.budgets().len());
                }
            }
            AppEvent::GoalsLoaded(ticket, result) => {
                if self.goals.view.finish_load(ticket, result) {
                    clamp_list(&mut self.goals.sel, self.goals.view.goals().len());
                }
            }
            AppEvent::TxnCreated(ticket, result) => match self.txns.view.apply_created(ticket, result) {
                Ok(_) => {
                    let kind = self.add.form.kind();
                    self.add.form = AddTransactionForm::with_kind(kind, util::today());
                    self.add.errors = FieldErrors::new();
                    self.add.message = Some(format!("{} added", kind.label()));
                }
                // An earlier submit is still running and will report itself.
                Err(ClientError::Busy) => {}
                Err(ClientError::Validation(errors)) => self.add.errors = errors,
                Err(err) => self.add.message = Some(format!("Save failed: {err}")),
            },
            AppEvent::TxnDeleted(ticket, id, result) => {
                self.status = match self.txns.view.apply_deleted(ticket, &id, result) {
                    Ok(_) => "Transaction deleted".into(),
                    Err(err) => format!("Delete failed: {err}"),
                };
                clamp_table(&mut self.txns.sel, self.txns.view.visible().len());
            }
            AppEvent::BudgetCreated(ticket, result) => match self.budgets.view.apply_created(ticket, result) {
                Ok(_) => {
                    self.budgets.modal = None;
                    self.status = "Budget created".into();
                }
                Err(ClientError::Busy) => {}
                Err(err) => self.modal_error_budget(err),
            },
            AppEvent::BudgetDeleted(ticket, id, result) => {
                self.status = match self.budgets.view.apply_deleted(ticket, &id, result) {
                    Ok(_) => "Budget deleted".into(),
                    Err(err) => format!("Delete failed: {err}"),
                };
                clamp_list(&mut self.budgets.sel, self.budgets.view.budgets().len());
            }
            AppEvent::GoalCreated(ticket, result) => match self.goals.view.apply_created(ticket, result) {
                Ok(_) => {
                    self.goals.modal = None;
                    self.status = "Goal created".into();
                }
                Err(ClientError::Busy) => {}
                Err(err) => self.modal_error_goal(err),
            },
            AppEvent::GoalUpdated(ticket, result) => {
                self.status = match self.goals.view.apply_updated(ticket, result) {
                    Ok(_) => "Progress saved".into(),
                    Err(err) => format!("Update failed: {err}"),
                };
            }
            AppEvent::GoalDeleted(ticket, id, result) => {
                self.status = match self.goals.view.apply_deleted(ticket, &id, result) {
                    Ok(_) => "Goal deleted".into(),
                    Err(err) => format!("Delete failed: {err}"),
                };
                clamp_list(&mut self.goals.sel, self.goals.view.goals().len());
            }
        }
    }

    fn modal_error_budget(&mut self, err: ClientError) {
        match (&mut self.budgets.modal, err) {
            (Some(modal), ClientError::Validation(errors)) => modal.errors = errors,
            (Some(modal), err) => modal.error = Some(err.to_string()),
            (None, err) => self.status = format!("Budget not created: {err}"),
        }
    }

    fn modal_error_goal(&mut self, err: ClientError) {
        match (&mut self.goals.modal, err) {
            (Some(modal), ClientError::Validation(errors)) => modal.errors = errors,
            (Some(modal), err) => modal.error = Some(err.to_string()),
            (None, err) => self.status = format!("Goal not created: {err}"),
        }
    }

    // ============= Keys =============

    /// True while keystrokes go into a text field.
    fn capturing_text(&self) -> bool {
        match self.tab {
            Tab::Auth => true,
            Tab::Transactions => self.txns.searching,
            Tab::AddTxn => self.add.editing.is_some(),
            Tab::Budgets => self.budgets.modal.is_some(),
            Tab::Goals => self.goals.modal.is_some() || self.goals.progress.is_some(),
            Tab::Dashboard | Tab::Help => false,
        }
    }

    pub fn handle_key(&mut self, k: KeyEvent) {
        if k.kind != KeyEventKind::Press {
            return;
        }

        if !self.capturing_text() {
            match k.code {
                KeyCode::Char('q') => {
                    self.quit = true;
                    return;
                }
                KeyCode::Char('?') => {
                    self.switch_tab(Tab::Help);
                    return;
                }
                KeyCode::Char('L') => {
                    self.session().logout();
                    return;
                }
                KeyCode::Char(c @ '1'..='6') => {
                    let idx = c as usize - '1' as usize;
                    self.switch_tab(Tab::MAIN[idx]);
                    return;
                }
                KeyCode::Tab => {
                    let idx = Tab::MAIN.iter().position(|t| *t == self.tab).unwrap_or(0);
                    self.switch_tab(Tab::MAIN[(idx + 1) % Tab::MAIN.len()]);
                    return;
                }
                _ => {}
            }
        }

        match self.tab {
            Tab::Auth => self.auth_key(k),
            Tab::Dashboard => self.dashboard_key(k.code),
            Tab::Transactions => self.txns_key(k.code),
            Tab::AddTxn => self.add_txn_key(k.code),
            Tab::Budgets => self.budgets_key(k.code),
            Tab::Goals => self.goals_key(k.code),
            Tab::Help => {
                if matches!(k.code, KeyCode::Esc | KeyCode::Char('b')) {
                    self.switch_tab(Tab::Dashboard);
                }
            }
        }
    }

    fn auth_key(&mut self, k: KeyEvent) {
        if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('t') {
            self.auth.toggle_mode();
            return;
        }
        match k.code {
            KeyCode::Esc => self.quit = true,
            KeyCode::Tab | KeyCode::Down => {
                self.auth.focus = (self.auth.focus + 1) % self.auth.field_count();
            }
            KeyCode::BackTab | KeyCode::Up => {
                let n = self.auth.field_count();
                self.auth.focus = (self.auth.focus + n - 1) % n;
            }
            KeyCode::Enter => self.submit_auth(),
            code => {
                self.auth.focused().handle(code);
            }
        }
    }

    fn submit_auth(&mut self) {
        if self.auth.pending {
            return;
        }
        let email = self.auth.email.value.trim().to_string();
        let password = self.auth.password.value.clone();
        let name = self.auth.name.value.trim().to_string();
        if email.is_empty() || password.is_empty() || (self.auth.mode == AuthMode::Register && name.is_empty()) {
            self.auth.error = Some("Please fill in all fields".into());
            return;
        }

        self.auth.pending = true;
        self.auth.error = None;
        let session = self.session().clone();
        match self.auth.mode {
            AuthMode::Login => self.spawn(async move {
                AppEvent::SignedIn(session.login(&email, &password).await)
            }),
            AuthMode::Register => self.spawn(async move {
                AppEvent::SignedIn(session.register(&name, &email, &password).await)
            }),
        }
    }

    fn dashboard_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('p') => {
                let next = self.dashboard.period().next();
                if let Some(ticket) = self.dashboard.set_period(next) {
                    let api = self.api.clone();
                    self.spawn(async move {
                        AppEvent::DashboardLoaded(ticket, DashboardView::fetch(&api, next).await)
                    });
                }
            }
            KeyCode::Char('r') => self.reload(),
            _ => {}
        }
    }

    fn txns_key(&mut self, code: KeyCode) {
        if self.txns.searching {
            match code {
                KeyCode::Enter | KeyCode::Esc => self.txns.searching = false,
                code => edit_text(&mut self.txns.view.filter.search, code),
            }
            clamp_table(&mut self.txns.sel, self.txns.view.visible().len());
            return;
        }

        let len = self.txns.view.visible().len();
        match code {
            KeyCode::Up => move_table(&mut self.txns.sel, len, -1),
            KeyCode::Down => move_table(&mut self.txns.sel, len, 1),
            KeyCode::Char('/') => self.txns.searching = true,
            KeyCode::Char('f') => {
                self.txns.view.filter.kind = match self.txns.view.filter.kind {
                    None => Some(TxnKind::Expense),
                    Some(TxnKind::Expense) => Some(TxnKind::Income),
                    Some(_) => None,
                };
            }
            KeyCode::Char('s') => {
                self.txns.view.filter.sort = match self.txns.view.filter.sort {
                    SortKey::Date => SortKey::Amount,
                    SortKey::Amount => SortKey::Date,
                };
            }
            KeyCode::Char('o') => {
                self.txns.view.filter.order = self.txns.view.filter.order.flip();
            }
            KeyCode::Char('a') => self.switch_tab(Tab::AddTxn),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('x') | KeyCode::Delete => self.delete_txn(),
            _ => {}
        }
        clamp_table(&mut self.txns.sel, self.txns.view.visible().len());
    }

    fn delete_txn(&mut self) {
        if self.txns.view.origin() == Origin::Placeholder {
            self.status = "Demo data cannot be changed".into();
            return;
        }
        let Some(id) = self
            .txns
            .sel
            .selected()
            .and_then(|i| self.txns.view.visible().get(i).map(|t| t.id.clone()))
        else {
            return;
        };
        let ticket = self.txns.view.ticket();
        let api = self.api.clone();
        self.spawn(async move {
            let result = api.delete_transaction(&id).await;
            AppEvent::TxnDeleted(ticket, id, result)
        });
    }

    fn add_txn_key(&mut self, code: KeyCode) {
        if let Some(field) = self.add.editing {
            match code {
                KeyCode::Enter | KeyCode::Esc => self.add.editing = None,
                KeyCode::Tab => self.add.editing = Some(field.next()),
                code => {
                    let target = match field {
                        EditField::Amount => &mut self.add.form.amount,
                        EditField::Description => &mut self.add.form.description,
                        EditField::Date => &mut self.add.form.date,
                    };
                    edit_text(target, code);
                }
            }
            return;
        }

        match code {
            KeyCode::Up => self.move_category(-1),
            KeyCode::Down => self.move_category(1),
            KeyCode::Char('a') => self.add.editing = Some(EditField::Amount),
            KeyCode::Char('e') => self.add.editing = Some(EditField::Description),
            KeyCode::Char('d') => self.add.editing = Some(EditField::Date),
            KeyCode::Char('t') => {
                let next = match self.add.form.kind() {
                    TxnKind::Expense => TxnKind::Income,
                    _ => TxnKind::Expense,
                };
                self.add.form.set_kind(next);
                self.add.cat_sel.select(None);
            }
            KeyCode::Char('s') | KeyCode::Enter => self.submit_txn(),
            KeyCode::Esc | KeyCode::Char('b') => {
                self.add.errors = FieldErrors::new();
                self.add.message = None;
                self.switch_tab(Tab::Transactions);
            }
            _ => {}
        }
    }

    fn move_category(&mut self, delta: isize) {
        let options: Vec<String> = self
            .add
            .form
            .categories_for(self.txns.view.categories())
            .into_iter()
            .map(|c| c.id.clone())
            .collect();
        move_list(&mut self.add.cat_sel, options.len(), delta);
        if let Some(id) = self.add.cat_sel.selected().and_then(|i| options.get(i)) {
            self.add.form.category_id = id.clone();
            self.add.errors.clear_field("category_id");
        }
    }

    fn submit_txn(&mut self) {
        if self.txns.view.origin() == Origin::Placeholder {
            self.add.message = Some("Backend unreachable, cannot save".into());
            return;
        }
        if let Err(err) = self.add.form.validate() {
            match err {
                ClientError::Validation(errors) => self.add.errors = errors,
                err => self.add.message = Some(err.to_string()),
            }
            return;
        }
        if self.add.guard.is_busy() {
            return;
        }
        self.add.errors = FieldErrors::new();
        self.add.message = Some("Saving…".into());

        let ticket = self.txns.view.ticket();
        let (api, form, guard) = (self.api.clone(), self.add.form.clone(), self.add.guard.clone());
        self.spawn(async move { AppEvent::TxnCreated(ticket, form.submit(&api, &guard).await) });
    }

    fn budgets_key(&mut self, code: KeyCode) {
        if self.budgets.modal.is_some() {
            self.budget_modal_key(code);
            return;
        }
        let len = self.budgets.view.budgets().len();
        match code {
            KeyCode::Up => move_list(&mut self.budgets.sel, len, -1),
            KeyCode::Down => move_list(&mut self.budgets.sel, len, 1),
            KeyCode::Char('n') => self.budgets.modal = Some(BudgetModal::default()),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('x') | KeyCode::Delete => {
                let Some(id) = self
                    .budgets
                    .sel
                    .selected()
                    .and_then(|i| self.budgets.view.budgets().get(i).map(|b| b.id.clone()))
                else {
                    return;
                };
                let ticket = self.budgets.view.ticket();
                let api = self.api.clone();
                self.spawn(async move {
                    let result = api.delete_budget(&id).await;
                    AppEvent::BudgetDeleted(ticket, id, result)
                });
            }
            _ => {}
        }
    }

    fn budget_modal_key(&mut self, code: KeyCode) {
        let category_ids: Vec<String> = self.budgets.view.categories().iter().map(|c| c.id.clone()).collect();
        let Some(modal) = self.budgets.modal.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => self.budgets.modal = None,
            KeyCode::Tab | KeyCode::Down => modal.focus = (modal.focus + 1) % 4,
            KeyCode::BackTab | KeyCode::Up => modal.focus = (modal.focus + 3) % 4,
            KeyCode::Left | KeyCode::Right if modal.focus == 2 => modal.form.cycle_period(),
            KeyCode::Left | KeyCode::Right if modal.focus == 3 => {
                modal.form.category_id = cycle_option(&category_ids, &modal.form.category_id);
            }
            KeyCode::Enter => {
                match modal.form.validate() {
                    Err(ClientError::Validation(errors)) => {
                        modal.errors = errors;
                        return;
                    }
                    Err(err) => {
                        modal.error = Some(err.to_string());
                        return;
                    }
                    Ok(_) => {
                        modal.errors = FieldErrors::new();
                        modal.error = None;
                    }
                }
                if self.budgets.guard.is_busy() {
                    return;
                }
                let ticket = self.budgets.view.ticket();
                let (api, form, guard) = (self.api.clone(), modal.form.clone(), self.budgets.guard.clone());
                self.spawn(async move { AppEvent::BudgetCreated(ticket, form.submit(&api, &guard).await) });
            }
            code => match modal.focus {
                0 => {
                    edit_text(&mut modal.form.name, code);
                    modal.errors.clear_field("name");
                }
                1 => {
                    edit_text(&mut modal.form.amount, code);
                    modal.errors.clear_field("amount");
                }
                _ => {}
            },
        }
    }

    fn goals_key(&mut self, code: KeyCode) {
        if self.goals.modal.is_some() {
            self.goal_modal_key(code);
            return;
        }
        if self.goals.progress.is_some() {
            self.goal_progress_key(code);
            return;
        }
        let len = self.goals.view.goals().len();
        match code {
            KeyCode::Up => move_list(&mut self.goals.sel, len, -1),
            KeyCode::Down => move_list(&mut self.goals.sel, len, 1),
            KeyCode::Char('n') => self.goals.modal = Some(GoalModal::default()),
            KeyCode::Char('p') if self.selected_goal().is_some() => {
                self.goals.progress = Some(LineEdit::default());
            }
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('x') | KeyCode::Delete => {
                let Some(id) = self.selected_goal().map(|g| g.id.clone()) else {
                    return;
                };
                let ticket = self.goals.view.ticket();
                let api = self.api.clone();
                self.spawn(async move {
                    let result = api.delete_goal(&id).await;
                    AppEvent::GoalDeleted(ticket, id, result)
                });
            }
            _ => {}
        }
    }

    pub fn selected_goal(&self) -> Option<&GoalDto> {
        self.goals.sel.selected().and_then(|i| self.goals.view.goals().get(i))
    }

    fn goal_progress_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => self.goals.progress = None,
            KeyCode::Enter => {
                let input = self.goals.progress.take().map(|e| e.value).unwrap_or_default();
                let Some(goal) = self.selected_goal() else {
                    return;
                };
                let id = goal.id.clone();
                match goals::add_progress(goal, &input) {
                    Ok(req) => {
                        let ticket = self.goals.view.ticket();
                        let api = self.api.clone();
                        self.spawn(async move { AppEvent::GoalUpdated(ticket, api.update_goal(&id, &req).await) });
                    }
                    Err(err) => self.status = err.to_string(),
                }
            }
            code => {
                if let Some(edit) = self.goals.progress.as_mut() {
                    edit.handle(code);
                }
            }
        }
    }

    fn goal_modal_key(&mut self, code: KeyCode) {
        let Some(modal) = self.goals.modal.as_mut() else {
            return;
        };
        match code {
            KeyCode::Esc => self.goals.modal = None,
            KeyCode::Tab | KeyCode::Down => modal.focus = (modal.focus + 1) % 5,
            KeyCode::BackTab | KeyCode::Up => modal.focus = (modal.focus + 4) % 5,
            KeyCode::Left | KeyCode::Right if modal.focus == 4 => modal.form.cycle_category(),
            KeyCode::Enter => {
                let today = util::today();
                match modal.form.validate(today) {
                    Err(ClientError::Validation(errors)) => {
                        modal.errors = errors;
                        return;
                    }
                    Err(err) => {
                        modal.error = Some(err.to_string());
                        return;
                    }
                    Ok(_) => {
                        modal.errors = FieldErrors::new();
                        modal.error = None;
                    }
                }
                if self.goals.guard.is_busy() {
                    return;
                }
                let ticket = self.goals.view.ticket();
                let (api, form, guard) = (self.api.clone(), modal.form.clone(), self.goals.guard.clone());
                self.spawn(async move { AppEvent::GoalCreated(ticket, form.submit(&api, &guard, today).await) });
            }
            code => {
                let (field, key) = match modal.focus {
                    0 => (&mut modal.form.title, "title"),
                    1 => (&mut modal.form.description, "description"),
                    2 => (&mut modal.form.target_amount, "target_amount"),
                    3 => (&mut modal.form.target_date, "target_date"),
                    _ => return,
                };
                edit_text(field, code);
                modal.errors.clear_field(key);
            }
        }
    }
}

/// Next entry after `current` in `options`, wrapping through "none" (empty).
fn cycle_option(options: &[String], current: &str) -> String {
    match options.iter().position(|o| o == current) {
        None => options.first().cloned().unwrap_or_default(),
        Some(i) => options.get(i + 1).cloned().unwrap_or_default(),
    }
}

fn step(len: usize, cur: Option<usize>, delta: isize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let cur = cur.unwrap_or(0) as isize;
    Some((cur + delta).rem_euclid(len as isize) as usize)
}

fn move_list(sel: &mut ListState, len: usize, delta: isize) {
    let next = step(len, sel.selected(), delta);
    sel.select(next);
}

fn move_table(sel: &mut TableState, len: usize, delta: isize) {
    let next = step(len, sel.selected(), delta);
    sel.select(next);
}

fn clamp(len: usize, cur: Option<usize>) -> Option<usize> {
    match (len, cur) {
        (0, _) => None,
        (n, Some(i)) if i >= n => Some(n - 1),
        (_, None) => Some(0),
        (_, x) => x,
    }
}

fn clamp_list(sel: &mut ListState, len: usize) {
    let next = clamp(len, sel.selected());
    sel.select(next);
}

fn clamp_table(sel: &mut TableState, len: usize) {
    let next = clamp(len, sel.selected());
    sel.select(next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::http::Endpoint;
    use crate::session::{MemoryStorage, Session};

    fn app(signed_in: bool) -> App {
        let endpoint = Endpoint::with_timeout(
            "http://127.0.0.1:9/".parse().unwrap(),
            Duration::from_millis(200),
        )
        .unwrap();
        let stored = Session {
            user: None,
            token: signed_in.then(|| "T1".to_string()),
            is_authenticated: signed_in,
        };
        let session = SessionStore::new(endpoint, MemoryStorage::with_session(stored));
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(ApiClient::new(session), tx)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[tokio::test]
    async fn sign_in_screen_captures_global_keys() {
        let mut app = app(false);
        press(&mut app, KeyCode::Char('q'));
        press(&mut app, KeyCode::Char('3'));
        assert!(!app.quit);
        assert_eq!(app.tab, Tab::Auth);
    }

    #[tokio::test]
    async fn switching_tabs_moves_the_mount() {
        let mut app = app(true);
        app.start();
        assert_eq!(app.tab, Tab::Dashboard);
        assert!(app.dashboard.lifecycle().is_mounted());

        press(&mut app, KeyCode::Char('4'));
        assert_eq!(app.tab, Tab::Budgets);
        assert!(!app.dashboard.lifecycle().is_mounted());
        assert!(app.budgets.view.lifecycle().is_mounted());
    }

    #[tokio::test]
    async fn add_tab_shares_the_transactions_mount() {
        let mut app = app(true);
        app.switch_tab(Tab::Transactions);
        let ticket = app.txns.view.ticket();
        app.switch_tab(Tab::AddTxn);
        assert!(app.txns.view.lifecycle().accepts(ticket));
    }

    #[tokio::test]
    async fn sign_out_returns_to_auth_and_drops_views() {
        let mut app = app(true);
        app.switch_tab(Tab::Goals);
        let ticket = app.goals.view.ticket();

        app.on_session(SessionEvent::SignedOut);

        assert_eq!(app.tab, Tab::Auth);
        assert!(!app.goals.view.lifecycle().accepts(ticket));
        app.apply(AppEvent::GoalsLoaded(ticket, Ok(Vec::new())));
        assert_eq!(app.goals.view.status(), &crate::views::LoadStatus::Idle);
    }

    #[tokio::test]
    async fn second_submit_keeps_the_saving_message() {
        let mut app = app(true);
        app.switch_tab(Tab::AddTxn);
        app.add.form.amount = "4.50".into();
        app.add.form.description = "Coffee".into();
        app.add.form.category_id = "food".into();

        let guard = app.add.guard.clone();
        let permit = guard.acquire().unwrap();
        app.submit_txn();
        assert_eq!(app.add.message, None);

        drop(permit);
        app.add.message = Some("Saving…".into());
        let ticket = app.txns.view.ticket();
        app.apply(AppEvent::TxnCreated(ticket, Err(ClientError::Busy)));
        assert_eq!(app.add.message.as_deref(), Some("Saving…"));
        assert_eq!(app.add.form.description, "Coffee");
    }

    #[tokio::test]
    async fn quit_from_main_screen() {
        let mut app = app(true);
        app.switch_tab(Tab::Dashboard);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.quit);
    }

    #[test]
    fn option_cycle_passes_through_none() {
        let ids = vec!["a".to_string(), "b".to_string()];
        assert_eq!(cycle_option(&ids, ""), "a");
        assert_eq!(cycle_option(&ids, "a"), "b");
        assert_eq!(cycle_option(&ids, "b"), "");
    }

    #[test]
    fn selection_wraps_and_clamps() {
        assert_eq!(step(3, Some(2), 1), Some(0));
        assert_eq!(step(3, None, -1), Some(2));
        assert_eq!(step(0, Some(1), 1), None);
        assert_eq!(clamp(2, Some(5)), Some(1));
        assert_eq!(clamp(0, Some(0)), None);
    }
}
