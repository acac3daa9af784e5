use sqlx::{sqlite::SqliteRow, Row};

use opsdesk_core::domain::staff::{Staff, StaffId, StaffTask, TaskId, TaskStatus};

use super::{
    json_list, parse_enum, parse_json_list, parse_optional_timestamp, parse_timestamp, parse_u32,
    RepositoryError, StaffRepository,
};
use crate::DbPool;

pub struct SqlStaffRepository {
    pool: DbPool,
}

impl SqlStaffRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_tasks(&self, staff_id: &str) -> Result<Vec<StaffTask>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, description, order_id, priority, status, assigned_at, completed_at
             FROM staff_task
             WHERE staff_id = ?
             ORDER BY assigned_at ASC, id ASC",
        )
        .bind(staff_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(task_from_row).collect()
    }
}

const STAFF_COLUMNS: &str = "id, name, role, phone, email, is_available, current_workload,
     max_workload, skills_json, created_at";

fn staff_from_row(row: SqliteRow) -> Result<Staff, RepositoryError> {
    Ok(Staff {
        id: StaffId(row.try_get("id")?),
        name: row.try_get("name")?,
        role: row.try_get("role")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        is_available: row.try_get("is_available")?,
        current_workload: parse_u32("current_workload", row.try_get("current_workload")?)?,
        max_workload: parse_u32("max_workload", row.try_get("max_workload")?)?,
        skills: parse_json_list("skills_json", row.try_get("skills_json")?)?,
        tasks: Vec::new(),
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn task_from_row(row: SqliteRow) -> Result<StaffTask, RepositoryError> {
    let status: TaskStatus = parse_enum("status", row.try_get("status")?)?;
    let priority: i64 = row.try_get("priority")?;
    Ok(StaffTask {
        id: TaskId(row.try_get("id")?),
        description: row.try_get("description")?,
        order_id: row.try_get("order_id")?,
        priority: u8::try_from(priority).map_err(|_| {
            RepositoryError::Decode(format!("invalid value for `priority`: {priority}"))
        })?,
        status,
        assigned_at: parse_timestamp("assigned_at", row.try_get("assigned_at")?)?,
        completed_at: parse_optional_timestamp("completed_at", row.try_get("completed_at")?)?,
    })
}

#[async_trait::async_trait]
impl StaffRepository for SqlStaffRepository {
    async fn find_by_id(&self, id: &StaffId) -> Result<Option<Staff>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {STAFF_COLUMNS} FROM staff WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut staff = staff_from_row(row)?;
                staff.tasks = self.load_tasks(&staff.id.0).await?;
                Ok(Some(staff))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Staff>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {STAFF_COLUMNS} FROM staff ORDER BY name ASC"))
            .fetch_all(&self.pool)
            .await?;

        let mut members = Vec::with_capacity(rows.len());
        for row in rows {
            let mut staff = staff_from_row(row)?;
            staff.tasks = self.load_tasks(&staff.id.0).await?;
            members.push(staff);
        }
        Ok(members)
    }

    async fn save(&self, staff: &Staff) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO staff (id, name, role, phone, email, is_available, current_workload,
                                max_workload, skills_json, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 role = excluded.role,
                 phone = excluded.phone,
                 email = excluded.email,
                 is_available = excluded.is_available,
                 current_workload = excluded.current_workload,
                 max_workload = excluded.max_workload,
                 skills_json = excluded.skills_json",
        )
        .bind(&staff.id.0)
        .bind(&staff.name)
        .bind(&staff.role)
        .bind(&staff.phone)
        .bind(&staff.email)
        .bind(staff.is_available)
        .bind(i64::from(staff.current_workload))
        .bind(i64::from(staff.max_workload))
        .bind(json_list(&staff.skills)?)
        .bind(staff.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for task in &staff.tasks {
            sqlx::query(
                "INSERT INTO staff_task (id, staff_id, description, order_id, priority, status,
                                         assigned_at, completed_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     description = excluded.description,
                     priority = excluded.priority,
                     status = excluded.status,
                     completed_at = excluded.completed_at",
            )
            .bind(&task.id.0)
            .bind(&staff.id.0)
            .bind(&task.description)
            .bind(&task.order_id)
            .bind(i64::from(task.priority))
            .bind(task.status.as_str())
            .bind(task.assigned_at.to_rfc3339())
            .bind(task.completed_at.map(|at| at.to_rfc3339()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: &StaffId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM staff_task WHERE staff_id = ?").bind(&id.0).execute(&mut *tx).await?;
        let result = sqlx::query("DELETE FROM staff WHERE id = ?").bind(&id.0).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use opsdesk_core::domain::staff::{Staff, StaffId, StaffTask, TaskStatus};

    use super::SqlStaffRepository;
    use crate::repositories::StaffRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn member(id: &str, name: &str) -> Staff {
        Staff {
            id: StaffId(id.to_string()),
            name: name.to_string(),
            role: "Packer".to_string(),
            phone: "+91-9700000000".to_string(),
            email: None,
            is_available: true,
            current_workload: 0,
            max_workload: 5,
            skills: vec!["packing".to_string(), "qc".to_string()],
            tasks: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn tasks_are_saved_with_their_member() {
        let repo = SqlStaffRepository::new(setup().await);
        let mut staff = member("stf-1", "Arjun");
        staff.assign(StaffTask::new("Pack order ORD-1", Some("o1".to_string()), 2));
        repo.save(&staff).await.expect("save");

        let task_id = staff.tasks[0].id.clone();
        staff.set_task_status(&task_id, TaskStatus::Completed).expect("complete");
        repo.save(&staff).await.expect("update");

        let found =
            repo.find_by_id(&StaffId("stf-1".to_string())).await.expect("find").expect("exists");
        assert_eq!(found.current_workload, 0);
        assert_eq!(found.tasks.len(), 1);
        assert_eq!(found.tasks[0].status, TaskStatus::Completed);
        assert!(found.tasks[0].completed_at.is_some());
        assert_eq!(found.skills, vec!["packing".to_string(), "qc".to_string()]);
    }

    #[tokio::test]
    async fn list_orders_by_name_and_delete_removes_tasks() {
        let pool = setup().await;
        let repo = SqlStaffRepository::new(pool.clone());
        let mut zara = member("stf-2", "Zara");
        zara.assign(StaffTask::new("Restock shelf", None, 1));
        repo.save(&zara).await.expect("save");
        repo.save(&member("stf-1", "Arjun")).await.expect("save");

        let names: Vec<String> =
            repo.list().await.expect("list").into_iter().map(|staff| staff.name).collect();
        assert_eq!(names, vec!["Arjun".to_string(), "Zara".to_string()]);

        assert!(repo.delete(&StaffId("stf-2".to_string())).await.expect("delete"));
        let orphaned: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM staff_task")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(orphaned, 0);
        assert!(!repo.delete(&StaffId("stf-2".to_string())).await.expect("delete again"));
    }
}
