//! In-memory [`LeadStore`] and [`TaskStore`] implementations.
//!
//! They behave like the remote stores where it matters to the engine: lead
//! rows have shifting positions, archived tasks are missing from `fetch_all`
//! but still answer `fetch_one`, and every call can be made to fail with an
//! HTTP-shaped [`MemoryError`]. Tests use them directly; the CLI seeds them
//! from a YAML [`MemoryFixture`].

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::container::ContainerMap;
use crate::description::parse_lead_marker;
use crate::error::{io_err, CoreError};
use crate::store::{classify_http_status, ErrorClass, LeadStore, TaskStore};
use crate::types::{
    ContainerId, LeadLocator, LeadPatch, LeadRecord, NewTask, Task, TaskId, TaskPatch,
};

/// Row number of the first data row; row 1 is the header.
pub const FIRST_DATA_ROW: usize = 2;

/// HTTP-shaped failure returned by the in-memory stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status}: {message}")]
pub struct MemoryError {
    pub status: u16,
    pub message: String,
}

impl MemoryError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadOp {
    FetchAll,
    Update,
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskOp {
    Create,
    Update,
    FetchAll,
    FetchOne,
}

#[derive(Debug)]
struct Failure<Op> {
    op: Op,
    target: Option<String>,
    error: MemoryError,
    sticky: bool,
}

#[derive(Debug)]
struct Injector<Op> {
    queue: VecDeque<Failure<Op>>,
    calls: HashMap<Op, usize>,
}

impl<Op: Copy + Eq + std::hash::Hash> Injector<Op> {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            calls: HashMap::new(),
        }
    }

    /// Count the call and pop the first failure matching `op`/`target`.
    fn check(&mut self, op: Op, target: Option<&str>) -> Result<(), MemoryError> {
        *self.calls.entry(op).or_insert(0) += 1;
        let hit = self.queue.iter().position(|f| {
            f.op == op
                && match (&f.target, target) {
                    (None, _) => true,
                    (Some(want), Some(got)) => want == got,
                    (Some(_), None) => false,
                }
        });
        match hit {
            Some(i) if self.queue[i].sticky => Err(self.queue[i].error.clone()),
            Some(i) => Err(self.queue.remove(i).map(|f| f.error).unwrap_or_else(|| {
                MemoryError::http(500, "injected failure vanished")
            })),
            None => Ok(()),
        }
    }

    fn push(&mut self, op: Op, target: Option<&str>, error: MemoryError, sticky: bool) {
        self.queue.push_back(Failure {
            op,
            target: target.map(str::to_string),
            error,
            sticky,
        });
    }

    fn calls(&self, op: Op) -> usize {
        self.calls.get(&op).copied().unwrap_or(0)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Lead store
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct LeadState {
    rows: Vec<LeadRecord>,
    injector: Injector<LeadOp>,
}

/// Spreadsheet-like store: an ordered list of rows, row 1 being a header.
#[derive(Debug)]
pub struct InMemoryLeadStore {
    state: Mutex<LeadState>,
}

impl Default for InMemoryLeadStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl InMemoryLeadStore {
    pub fn new(rows: Vec<LeadRecord>) -> Self {
        Self {
            state: Mutex::new(LeadState {
                rows,
                injector: Injector::new(),
            }),
        }
    }

    /// Current rows with freshly computed row positions.
    pub fn rows(&self) -> Vec<LeadRecord> {
        let state = lock(&self.state);
        positioned(&state.rows)
    }

    pub fn get(&self, id: &str) -> Option<LeadRecord> {
        self.rows().into_iter().find(|r| r.id.trim() == id)
    }

    /// Insert a row at `index`, shifting the positions of every row after it.
    pub fn insert_row(&self, index: usize, record: LeadRecord) {
        let mut state = lock(&self.state);
        let index = index.min(state.rows.len());
        state.rows.insert(index, record);
    }

    /// Edit a row in place as a human would, bypassing the engine.
    pub fn edit(&self, id: &str, edit: impl FnOnce(&mut LeadRecord)) -> bool {
        let mut state = lock(&self.state);
        match state.rows.iter_mut().find(|r| r.id.trim() == id) {
            Some(row) => {
                edit(row);
                true
            }
            None => false,
        }
    }

    /// Fail the next matching call once. `target` is the lead id for
    /// `Update`/`Append`; `None` matches any call.
    pub fn fail_next(&self, op: LeadOp, target: Option<&str>, error: MemoryError) {
        lock(&self.state).injector.push(op, target, error, false);
    }

    /// Fail every matching call from now on.
    pub fn fail_always(&self, op: LeadOp, target: Option<&str>, error: MemoryError) {
        lock(&self.state).injector.push(op, target, error, true);
    }

    pub fn calls(&self, op: LeadOp) -> usize {
        lock(&self.state).injector.calls(op)
    }
}

fn positioned(rows: &[LeadRecord]) -> Vec<LeadRecord> {
    rows.iter()
        .enumerate()
        .map(|(i, r)| LeadRecord {
            row_position: i + FIRST_DATA_ROW,
            ..r.clone()
        })
        .collect()
}

impl LeadStore for InMemoryLeadStore {
    type Error = MemoryError;

    fn fetch_all(&self) -> Result<Vec<LeadRecord>, MemoryError> {
        let mut state = lock(&self.state);
        state.injector.check(LeadOp::FetchAll, None)?;
        Ok(positioned(&state.rows))
    }

    fn update(&self, locator: &LeadLocator, patch: &LeadPatch) -> Result<(), MemoryError> {
        let mut state = lock(&self.state);
        state.injector.check(LeadOp::Update, Some(&locator.id.0))?;

        let hinted = locator
            .row_hint
            .checked_sub(FIRST_DATA_ROW)
            .filter(|i| {
                state
                    .rows
                    .get(*i)
                    .is_some_and(|r| r.id.trim() == locator.id.0)
            });
        let index = match hinted {
            Some(i) => i,
            None => state
                .rows
                .iter()
                .position(|r| r.id.trim() == locator.id.0)
                .ok_or_else(|| MemoryError::http(404, format!("lead {} not found", locator.id)))?,
        };
        patch.apply_to(&mut state.rows[index]);
        Ok(())
    }

    fn append(&self, record: &LeadRecord) -> Result<usize, MemoryError> {
        let mut state = lock(&self.state);
        state.injector.check(LeadOp::Append, Some(record.id.trim()))?;
        state.rows.push(record.clone());
        Ok(state.rows.len() - 1 + FIRST_DATA_ROW)
    }

    fn classify(&self, error: &MemoryError) -> ErrorClass {
        classify_http_status(error.status)
    }
}

// ---------------------------------------------------------------------------
// Task store
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct TaskState {
    tasks: Vec<Task>,
    archived: Vec<TaskId>,
    next_id: usize,
    injector: Injector<TaskOp>,
}

/// Board-like store: cards in lists, ids assigned on create.
#[derive(Debug)]
pub struct InMemoryTaskStore {
    state: Mutex<TaskState>,
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl InMemoryTaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        let next_id = tasks.len() + 1;
        Self {
            state: Mutex::new(TaskState {
                tasks,
                archived: Vec::new(),
                next_id,
                injector: Injector::new(),
            }),
        }
    }

    /// Every task, archived ones included.
    pub fn tasks(&self) -> Vec<Task> {
        lock(&self.state).tasks.clone()
    }

    pub fn get(&self, task_id: &str) -> Option<Task> {
        lock(&self.state)
            .tasks
            .iter()
            .find(|t| t.task_id.0 == task_id)
            .cloned()
    }

    /// Add a task as a human would, bypassing the engine.
    pub fn insert(&self, task: Task) {
        lock(&self.state).tasks.push(task);
    }

    /// Move a task to another container as a human would.
    pub fn move_to(&self, task_id: &str, container: impl Into<ContainerId>) -> bool {
        let mut state = lock(&self.state);
        match state.tasks.iter_mut().find(|t| t.task_id.0 == task_id) {
            Some(task) => {
                task.container = container.into();
                true
            }
            None => false,
        }
    }

    /// Delete a task outright.
    pub fn remove(&self, task_id: &str) -> Option<Task> {
        let mut state = lock(&self.state);
        let index = state.tasks.iter().position(|t| t.task_id.0 == task_id)?;
        Some(state.tasks.remove(index))
    }

    /// Hide a task from `fetch_all` while keeping it reachable by id.
    pub fn archive(&self, task_id: &str) {
        lock(&self.state).archived.push(TaskId::from(task_id));
    }

    /// Fail the next matching call once. `target` is the task id for
    /// `Update`/`FetchOne` and the lead id from the description marker (or the
    /// title) for `Create`; `None` matches any call.
    pub fn fail_next(&self, op: TaskOp, target: Option<&str>, error: MemoryError) {
        lock(&self.state).injector.push(op, target, error, false);
    }

    pub fn fail_always(&self, op: TaskOp, target: Option<&str>, error: MemoryError) {
        lock(&self.state).injector.push(op, target, error, true);
    }

    pub fn calls(&self, op: TaskOp) -> usize {
        lock(&self.state).injector.calls(op)
    }
}

fn create_target(task: &NewTask) -> String {
    parse_lead_marker(&task.description)
        .map(|id| id.0)
        .unwrap_or_else(|| task.title.clone())
}

impl TaskStore for InMemoryTaskStore {
    type Error = MemoryError;

    fn create(&self, task: &NewTask) -> Result<TaskId, MemoryError> {
        let mut state = lock(&self.state);
        state.injector.check(TaskOp::Create, Some(&create_target(task)))?;
        let task_id = TaskId(format!("task-{}", state.next_id));
        state.next_id += 1;
        state.tasks.push(task.clone().into_task(task_id.clone()));
        Ok(task_id)
    }

    fn update(&self, task_id: &TaskId, patch: &TaskPatch) -> Result<(), MemoryError> {
        let mut state = lock(&self.state);
        state.injector.check(TaskOp::Update, Some(&task_id.0))?;
        let task = state
            .tasks
            .iter_mut()
            .find(|t| &t.task_id == task_id)
            .ok_or_else(|| MemoryError::http(404, format!("task {task_id} not found")))?;
        patch.apply_to(task);
        Ok(())
    }

    fn fetch_all(&self) -> Result<Vec<Task>, MemoryError> {
        let mut state = lock(&self.state);
        state.injector.check(TaskOp::FetchAll, None)?;
        Ok(state
            .tasks
            .iter()
            .filter(|t| !state.archived.contains(&t.task_id))
            .cloned()
            .collect())
    }

    fn fetch_one(&self, task_id: &TaskId) -> Result<Option<Task>, MemoryError> {
        let mut state = lock(&self.state);
        state.injector.check(TaskOp::FetchOne, Some(&task_id.0))?;
        Ok(state.tasks.iter().find(|t| &t.task_id == task_id).cloned())
    }

    fn classify(&self, error: &MemoryError) -> ErrorClass {
        classify_http_status(error.status)
    }
}

// ---------------------------------------------------------------------------
// Fixture file
// ---------------------------------------------------------------------------

/// YAML seed for the in-memory stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryFixture {
    pub containers: ContainerMap,
    #[serde(default)]
    pub leads: Vec<LeadRecord>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl MemoryFixture {
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_yaml::from_str(&raw).map_err(|source| CoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the fixture via a temp file and rename.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let yaml = serde_yaml::to_string(self)?;
        let tmp = PathBuf::from(format!("{}.leadsync.tmp", path.display()));
        std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(path, e));
        }
        Ok(())
    }

    pub fn stores(&self) -> (InMemoryLeadStore, InMemoryTaskStore) {
        (
            InMemoryLeadStore::new(self.leads.clone()),
            InMemoryTaskStore::new(self.tasks.clone()),
        )
    }

    /// Replace the seed data with the stores' current contents.
    pub fn capture(&mut self, leads: &InMemoryLeadStore, tasks: &InMemoryTaskStore) {
        self.leads = leads.rows();
        self.tasks = tasks.tasks();
    }
}
