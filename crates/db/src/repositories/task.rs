use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use tracing::warn;

use aura_core::domain::contact::ContactId;
use aura_core::domain::property::PropertyId;
use aura_core::domain::task::{NewTask, NewViewing, Task, TaskId, TaskPriority, TaskStatus};

use super::relationship::INSERT_LINK_SQL;
use super::{column, decode_rows, optional_timestamp, RepositoryError};
use crate::DbPool;

const TASK_COLUMNS: &str = "id, title, description, status, priority, contact_id, property_id,
     created_date, due_date, completed_date";

const INSERT_TASK_SQL: &str =
    "INSERT INTO tasks (title, description, status, priority, contact_id, property_id,
                        created_date, due_date)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

pub struct SqlTaskRepository {
    pool: DbPool,
}

impl SqlTaskRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_task(r)?)),
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> Result<Vec<Task>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(decode_rows(&rows, "tasks", row_to_task))
    }

    pub async fn create(&self, task: NewTask) -> Result<Task, RepositoryError> {
        let result = bind_new_task(sqlx::query(INSERT_TASK_SQL), &task).execute(&self.pool).await?;
        Ok(pending_task(TaskId(result.last_insert_rowid()), task))
    }

    /// Inserts the viewing task and its link in one transaction.
    pub async fn schedule_viewing(&self, viewing: NewViewing) -> Result<Task, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result =
            bind_new_task(sqlx::query(INSERT_TASK_SQL), &viewing.task).execute(&mut *tx).await?;
        sqlx::query(INSERT_LINK_SQL)
            .bind(viewing.link.contact_id.0)
            .bind(viewing.link.property_id.0)
            .bind(viewing.link.relationship.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(pending_task(TaskId(result.last_insert_rowid()), viewing.task))
    }

    pub async fn save(&self, task: &Task) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO tasks (id, title, description, status, priority, contact_id, property_id,
                                created_date, due_date, completed_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 description = excluded.description,
                 status = excluded.status,
                 priority = excluded.priority,
                 contact_id = excluded.contact_id,
                 property_id = excluded.property_id,
                 due_date = excluded.due_date,
                 completed_date = excluded.completed_date",
        )
        .bind(task.id.0)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.contact_id.map(|id| id.0))
        .bind(task.property_id.map(|id| id.0))
        .bind(task.created_date.map(|at| at.to_rfc3339()))
        .bind(task.due_date.map(|at| at.to_rfc3339()))
        .bind(task.completed_date.map(|at| at.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn bind_new_task<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    task: &'q NewTask,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    query
        .bind(&task.title)
        .bind(&task.description)
        .bind(TaskStatus::Pending.as_str())
        .bind(task.priority.as_str())
        .bind(task.contact_id.map(|id| id.0))
        .bind(task.property_id.map(|id| id.0))
        .bind(task.created_date.to_rfc3339())
        .bind(task.due_date.map(|at| at.to_rfc3339()))
}

fn pending_task(id: TaskId, task: NewTask) -> Task {
    Task {
        id,
        title: task.title,
        description: task.description,
        status: TaskStatus::Pending,
        priority: task.priority,
        contact_id: task.contact_id,
        property_id: task.property_id,
        created_date: Some(task.created_date),
        due_date: task.due_date,
        completed_date: None,
    }
}

pub(crate) fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<Task, RepositoryError> {
    let id: i64 = column(row, "id")?;
    let status_str: String = column(row, "status")?;
    let priority_str: String = column(row, "priority")?;
    let status = TaskStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(event_name = "db.decode.task_status_unknown", task_id = id, raw = %status_str, "unknown task status; treating as Pending");
        TaskStatus::Pending
    });
    let priority = TaskPriority::parse(&priority_str).unwrap_or_else(|| {
        warn!(event_name = "db.decode.task_priority_unknown", task_id = id, raw = %priority_str, "unknown task priority; treating as Medium");
        TaskPriority::Medium
    });
    let contact_id: Option<i64> = column(row, "contact_id")?;
    let property_id: Option<i64> = column(row, "property_id")?;

    Ok(Task {
        id: TaskId(id),
        title: column(row, "title")?,
        description: column(row, "description")?,
        status,
        priority,
        contact_id: contact_id.map(ContactId),
        property_id: property_id.map(PropertyId),
        created_date: optional_timestamp(row, "created_date")?,
        due_date: optional_timestamp(row, "due_date")?,
        completed_date: optional_timestamp(row, "completed_date")?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use aura_core::domain::contact::ContactId;
    use aura_core::domain::property::PropertyId;
    use aura_core::domain::relationship::{ContactProperty, RelationshipKind};
    use aura_core::domain::task::{NewTask, NewViewing, TaskPriority, TaskStatus};

    use super::SqlTaskRepository;
    use crate::repositories::SqlRelationshipRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids_and_pending_status() {
        let repo = SqlTaskRepository::new(setup().await);
        let created_date = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid");
        let new_task = |title: &str| NewTask {
            title: title.to_owned(),
            description: None,
            priority: TaskPriority::High,
            contact_id: None,
            property_id: None,
            due_date: None,
            created_date,
        };

        let first = repo.create(new_task("Call back Sara")).await.expect("create");
        let second = repo.create(new_task("Send brochure")).await.expect("create");
        assert_eq!(second.id.0, first.id.0 + 1);
        assert_eq!(first.status, TaskStatus::Pending);

        let stored = repo.find_by_id(first.id).await.expect("find").expect("present");
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn viewing_writes_task_and_link_and_rebooking_keeps_one_link() {
        let pool = setup().await;
        sqlx::query("INSERT INTO contacts (id, name, lead_status) VALUES (2, 'Fatima', 'Warm')")
            .execute(&pool)
            .await
            .expect("contact");
        sqlx::query("INSERT INTO properties (id, building, unit) VALUES (2, 'Garden Homes', 'Villa 42')")
            .execute(&pool)
            .await
            .expect("property");

        let repo = SqlTaskRepository::new(pool.clone());
        let created_date = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid");
        let due = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).single().expect("valid");
        let viewing = NewViewing {
            task: NewTask {
                title: "Property viewing: Garden Homes Unit Villa 42".to_owned(),
                description: None,
                priority: TaskPriority::High,
                contact_id: Some(ContactId(2)),
                property_id: Some(PropertyId(2)),
                due_date: Some(due),
                created_date,
            },
            link: ContactProperty {
                contact_id: ContactId(2),
                property_id: PropertyId(2),
                relationship: RelationshipKind::ViewingScheduled,
            },
        };

        let first = repo.schedule_viewing(viewing.clone()).await.expect("schedule");
        let second = repo.schedule_viewing(viewing).await.expect("reschedule");
        assert_ne!(first.id, second.id);
        assert_eq!(first.due_date, Some(due));
        assert_eq!(first.status, TaskStatus::Pending);

        let links = SqlRelationshipRepository::new(pool).list().await.expect("links");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].relationship, RelationshipKind::ViewingScheduled);
    }

    #[tokio::test]
    async fn unknown_status_and_priority_fall_back() {
        let pool = setup().await;
        sqlx::query("INSERT INTO tasks (id, title, status, priority) VALUES (1, 'x', 'snoozed', 'meh')")
            .execute(&pool)
            .await
            .expect("insert");

        let tasks = SqlTaskRepository::new(pool).list().await.expect("list");
        assert_eq!(tasks[0].status, TaskStatus::Pending);
        assert_eq!(tasks[0].priority, TaskPriority::Medium);
    }
}
