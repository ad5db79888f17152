//! # Production Task Module
//!
//! Production tasks move forward through `todo → inprogress → completed`,
//! or are created directly as completed. Entering `completed` deducts the
//! recipe's ingredients from the inventory once: the task records when that
//! happened in `consumed_at` and the board refuses to deduct again for a
//! task that carries it.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::consumption::{consume, ConsumptionError, ConsumptionReport};
use crate::inventory::{lenient_number, lenient_string, InventoryItem};
use crate::recipes::RecipeBook;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Next status in the workflow, `None` once completed
    pub fn next(self) -> Option<TaskStatus> {
        match self {
            TaskStatus::Todo => Some(TaskStatus::InProgress),
            TaskStatus::InProgress => Some(TaskStatus::Completed),
            TaskStatus::Completed => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "inprogress",
            TaskStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionTask {
    pub id: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub recipe: String,
    /// Number of batches to produce
    #[serde(default, deserialize_with = "lenient_number")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub assigned_to: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// When the ingredients were deducted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_at: Option<DateTime<Utc>>,
}

/// Request to create a task
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub recipe: String,
    #[serde(deserialize_with = "lenient_number")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub assigned_to: String,
    #[serde(default)]
    pub status: TaskStatus,
}

/// Side effect of a status change on the inventory
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionEffect {
    /// The task did not reach `completed`
    None,
    /// Ingredients were deducted
    Consumed(ConsumptionReport),
    /// The task had already been consumed; nothing was deducted
    AlreadyConsumed,
    /// The task completed but its recipe does not exist; nothing was deducted
    RecipeMissing(ConsumptionError),
}

/// A task after a status change, with what the change did to the inventory
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub task: ProductionTask,
    pub effect: CompletionEffect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskError {
    NotFound(u64),
    MissingRecipe,
    InvalidQuantity(f64),
    AlreadyCompleted(u64),
    /// Every id up to `u64::MAX` is taken
    IdsExhausted,
}

impl TaskError {
    /// Localization key for the user-facing message
    pub fn message_key(&self) -> &'static str {
        match self {
            TaskError::NotFound(_) => "task-not-found",
            TaskError::MissingRecipe | TaskError::InvalidQuantity(_) => "task-invalid",
            TaskError::AlreadyCompleted(_) => "task-already-completed",
            TaskError::IdsExhausted => "task-ids-exhausted",
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::NotFound(id) => write!(f, "Task {id} not found"),
            TaskError::MissingRecipe => write!(f, "A recipe is required"),
            TaskError::InvalidQuantity(qty) => write!(f, "Invalid batch quantity: {qty}"),
            TaskError::AlreadyCompleted(id) => write!(f, "Task {id} is already completed"),
            TaskError::IdsExhausted => write!(f, "No task ids left"),
        }
    }
}

impl std::error::Error for TaskError {}

fn default_next_task_id() -> u64 {
    1
}

/// All production tasks and the id counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBoard {
    #[serde(default)]
    pub tasks: Vec<ProductionTask>,
    #[serde(default = "default_next_task_id")]
    pub next_task_id: u64,
}

impl Default for TaskBoard {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            next_task_id: default_next_task_id(),
        }
    }
}

impl TaskBoard {
    /// Make `next_task_id` larger than every existing id.
    ///
    /// Saturates at `u64::MAX`, which [`TaskBoard::create`] never hands out.
    pub fn reindex(&mut self) {
        let max_existing = self.tasks.iter().map(|task| task.id).max().unwrap_or(0);
        self.next_task_id = self
            .next_task_id
            .max(max_existing.saturating_add(1))
            .max(1);
    }

    /// Create a task; a task created as completed deducts its ingredients immediately
    pub fn create(
        &mut self,
        new_task: NewTask,
        inventory: &mut [InventoryItem],
        recipes: &RecipeBook,
    ) -> Result<Transition, TaskError> {
        let recipe = new_task.recipe.trim();
        if recipe.is_empty() {
            return Err(TaskError::MissingRecipe);
        }
        if !new_task.quantity.is_finite() || new_task.quantity <= 0.0 {
            return Err(TaskError::InvalidQuantity(new_task.quantity));
        }

        self.reindex();
        let id = self.next_task_id;
        let next_task_id = id.checked_add(1).ok_or(TaskError::IdsExhausted)?;
        let mut task = ProductionTask {
            id,
            recipe: recipe.to_string(),
            quantity: new_task.quantity,
            assigned_to: new_task.assigned_to,
            status: new_task.status,
            consumed_at: None,
        };
        self.next_task_id = next_task_id;

        let effect = if task.status == TaskStatus::Completed {
            finish(&mut task, inventory, recipes)
        } else {
            CompletionEffect::None
        };

        self.tasks.push(task.clone());
        Ok(Transition { task, effect })
    }

    /// Move a task one step forward
    pub fn advance(
        &mut self,
        id: u64,
        inventory: &mut [InventoryItem],
        recipes: &RecipeBook,
    ) -> Result<Transition, TaskError> {
        let task = self.task_mut(id)?;
        match task.status.next() {
            Some(TaskStatus::Completed) => {
                let effect = finish(task, inventory, recipes);
                Ok(Transition {
                    task: task.clone(),
                    effect,
                })
            }
            Some(next) => {
                task.status = next;
                Ok(Transition {
                    task: task.clone(),
                    effect: CompletionEffect::None,
                })
            }
            None => Err(TaskError::AlreadyCompleted(id)),
        }
    }

    /// Complete a task from any earlier status
    pub fn complete(
        &mut self,
        id: u64,
        inventory: &mut [InventoryItem],
        recipes: &RecipeBook,
    ) -> Result<Transition, TaskError> {
        let task = self.task_mut(id)?;
        if task.status == TaskStatus::Completed {
            return Err(TaskError::AlreadyCompleted(id));
        }
        let effect = finish(task, inventory, recipes);
        Ok(Transition {
            task: task.clone(),
            effect,
        })
    }

    fn task_mut(&mut self, id: u64) -> Result<&mut ProductionTask, TaskError> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or(TaskError::NotFound(id))
    }
}

/// Mark a task completed and deduct its ingredients unless that already happened
fn finish(
    task: &mut ProductionTask,
    inventory: &mut [InventoryItem],
    recipes: &RecipeBook,
) -> CompletionEffect {
    task.status = TaskStatus::Completed;

    if task.consumed_at.is_some() {
        warn!("Task {} was already consumed, skipping deduction", task.id);
        return CompletionEffect::AlreadyConsumed;
    }

    match consume(inventory, recipes, &task.recipe, task.quantity) {
        Ok(report) => {
            task.consumed_at = Some(Utc::now());
            CompletionEffect::Consumed(report)
        }
        Err(err) => {
            warn!("Task {} completed without deduction: {}", task.id, err);
            CompletionEffect::RecipeMissing(err)
        }
    }
}
