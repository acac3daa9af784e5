use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use opsdesk_core::outreach::PotentialLead;

pub fn report_file_name(at: DateTime<Utc>) -> String {
    format!("potential_leads_{}.txt", at.format("%Y%m%d_%H%M%S"))
}

pub fn render_report(leads: &[PotentialLead], at: DateTime<Utc>) -> String {
    let rule = "=".repeat(60);
    let mut out = format!(
        "POTENTIAL LEADS REPORT\nGenerated: {}\nTotal potential leads: {}\n{rule}\n",
        at.format("%Y-%m-%d %H:%M:%S UTC"),
        leads.len()
    );

    if leads.is_empty() {
        out.push_str("\nNo potential leads were identified in this run.\n");
        return out;
    }

    for (position, lead) in leads.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {}\n   Lead ID:  {}\n   Email:    {}\n   Phone:    {}\n   Company:  {}\n   Industry: {}\n",
            position + 1,
            lead.name,
            lead.id.0,
            lead.email,
            lead.phone,
            lead.company,
            lead.industry,
        ));
        if let Some(role) = &lead.role {
            out.push_str(&format!("   Role:     {role}\n"));
        }
        out.push_str(&format!("   Summary:  {}\n", lead.summary));
    }
    out.push_str(&format!("\n{rule}\n"));
    out
}

/// Writes the report into `dir`, creating it when needed, and returns the file path.
pub async fn write_report(
    dir: &Path,
    leads: &[PotentialLead],
    at: DateTime<Utc>,
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(report_file_name(at));
    tokio::fs::write(&path, render_report(leads, at)).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use opsdesk_core::domain::lead::LeadId;
    use opsdesk_core::outreach::PotentialLead;

    use super::{render_report, report_file_name, write_report};

    fn potential() -> PotentialLead {
        PotentialLead {
            id: LeadId("LEAD_003".to_string()),
            name: "Michael Chen".to_string(),
            email: "m.chen@healthplus.com".to_string(),
            phone: "+1-555-0103".to_string(),
            company: "HealthPlus Medical".to_string(),
            industry: "Healthcare".to_string(),
            role: None,
            summary: "Wants a pricing sheet for 40 clinics".to_string(),
        }
    }

    #[test]
    fn file_name_uses_compact_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).single().expect("valid time");
        assert_eq!(report_file_name(at), "potential_leads_20260309_140507.txt");
    }

    #[test]
    fn report_lists_identifying_fields_and_summary() {
        let text = render_report(&[potential()], Utc::now());
        assert!(text.contains("Total potential leads: 1"));
        assert!(text.contains("Lead ID:  LEAD_003"));
        assert!(text.contains("Summary:  Wants a pricing sheet for 40 clinics"));
        assert!(!text.contains("Role:"));
    }

    #[tokio::test]
    async fn write_report_creates_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("nested").join("reports");

        let path = write_report(&target, &[potential()], Utc::now()).await.expect("write");

        let written = std::fs::read_to_string(&path).expect("read back");
        assert!(written.contains("Michael Chen"));
        assert!(path.starts_with(&target));
    }
}
