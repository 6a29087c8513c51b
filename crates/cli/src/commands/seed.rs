use aura_db::{SampleDataset, SeedResult};
use chrono::Utc;

use crate::commands::{finish, open_database, prepare, CommandResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let dataset = SampleDataset::build(Utc::now());

        let loaded = dataset
            .load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = dataset
            .verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        pool.close().await;

        if !verification.all_present {
            return Err(("seed_verification", verification_message(&verification.checks), 6u8));
        }
        Ok(summary(&loaded))
    });

    finish("seed", result)
}

fn summary(loaded: &SeedResult) -> String {
    format!(
        "sample dataset loaded: {} properties, {} contacts, {} deals, {} tasks, {} property links",
        loaded.properties, loaded.contacts, loaded.deals, loaded.tasks, loaded.links
    )
}

fn verification_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use aura_db::SeedResult;

    use super::{summary, verification_message};

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = [("properties", true), ("deals", false), ("contact_properties", false)];
        assert_eq!(
            verification_message(&checks),
            "Seed verification failed for checks: deals, contact_properties"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let checks = [("properties", true), ("contacts", true)];
        assert_eq!(verification_message(&checks), "Some seed data failed to load");
    }

    #[test]
    fn summary_lists_every_table() {
        let loaded = SeedResult { properties: 3, contacts: 3, deals: 2, tasks: 4, links: 3 };
        assert_eq!(
            summary(&loaded),
            "sample dataset loaded: 3 properties, 3 contacts, 2 deals, 4 tasks, 3 property links"
        );
    }
}
