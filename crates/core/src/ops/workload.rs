use crate::domain::staff::Staff;

/// The available member with the most headroom; ties keep roster order.
pub fn pick_assignee(staff: &[Staff]) -> Option<&Staff> {
    staff
        .iter()
        .filter(|member| member.has_capacity())
        .min_by_key(|member| member.current_workload)
}

pub fn pick_assignee_mut(staff: &mut [Staff]) -> Option<&mut Staff> {
    staff
        .iter_mut()
        .filter(|member| member.has_capacity())
        .min_by_key(|member| member.current_workload)
}

/// Plain-text roster used as context for the staff handler.
pub fn roster_text(staff: &[Staff]) -> String {
    if staff.is_empty() {
        return "No staff members on record.".to_string();
    }

    staff
        .iter()
        .map(|member| {
            let availability = if member.is_available { "available" } else { "unavailable" };
            let open_tasks = member.tasks.iter().filter(|task| task.status.is_open()).count();
            format!(
                "- {} ({}): {}/{} tasks, {} open, {:.0}% utilized, {}",
                member.name,
                member.role,
                member.current_workload,
                member.max_workload,
                open_tasks,
                member.utilization(),
                availability
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{pick_assignee, pick_assignee_mut, roster_text};
    use crate::domain::staff::{Staff, StaffId};

    fn member(id: &str, current: u32, available: bool) -> Staff {
        Staff {
            id: StaffId(id.to_owned()),
            name: format!("Member {id}"),
            role: "Packer".to_owned(),
            phone: String::new(),
            email: None,
            is_available: available,
            current_workload: current,
            max_workload: 5,
            skills: Vec::new(),
            tasks: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn least_loaded_available_member_wins() {
        let staff = vec![member("a", 3, true), member("b", 1, false), member("c", 2, true)];
        assert_eq!(pick_assignee(&staff).map(|m| m.id.0.as_str()), Some("c"));
    }

    #[test]
    fn ties_keep_roster_order() {
        let mut staff = vec![member("a", 2, true), member("b", 2, true)];
        assert_eq!(pick_assignee_mut(&mut staff).map(|m| m.id.0.clone()), Some("a".to_owned()));
    }

    #[test]
    fn nobody_is_picked_when_everyone_is_full() {
        let staff = vec![member("a", 5, true), member("b", 0, false)];
        assert!(pick_assignee(&staff).is_none());
    }

    #[test]
    fn roster_lists_every_member() {
        let text = roster_text(&[member("a", 1, true), member("b", 0, false)]);
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("Member a (Packer): 1/5 tasks"));
        assert!(text.contains("unavailable"));
        assert_eq!(roster_text(&[]), "No staff members on record.");
    }
}
