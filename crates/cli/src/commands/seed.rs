use opsdesk_db::{DemoSeedDataset, SeedResult};

use crate::commands::{with_migrated_pool, CommandResult};

pub fn run() -> CommandResult {
    let result = with_migrated_pool("seed", |pool| async move {
        let seeded = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 6u8))?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 7u8))?;
        if !verification.all_present {
            let failed = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            return Err(("seed_verification", verification_message(&failed), 7u8));
        }

        let leads = DemoSeedDataset::demo_leads()
            .map_err(|error| ("seed_verification", error.to_string(), 7u8))?
            .clients
            .len();
        Ok((seeded, leads))
    });

    match result {
        Ok((seeded, leads)) => CommandResult::success("seed", summary(&seeded, leads)),
        Err(failure) => failure,
    }
}

fn summary(seeded: &SeedResult, leads: usize) -> String {
    format!(
        "demo shop ready: {} products, {} staff members, {} suppliers; \
         {leads} sample leads available via POST /api/leads/load-demo",
        seeded.products, seeded.staff, seeded.suppliers
    )
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use opsdesk_db::SeedResult;

    use super::{summary, verification_message};

    #[test]
    fn verification_error_message_targets_failed_checks() {
        assert_eq!(
            verification_message(&["staff", "supplier-coverage"]),
            "seed verification failed for checks: staff, supplier-coverage"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_message(&[]), "some seed data failed to load");
    }

    #[test]
    fn summary_counts_every_seeded_table() {
        let seeded = SeedResult { products: 18, staff: 8, suppliers: 9 };
        let message = summary(&seeded, 5);
        assert!(message.starts_with("demo shop ready: 18 products, 8 staff members, 9 suppliers"));
        assert!(message.contains("5 sample leads"));
    }
}
