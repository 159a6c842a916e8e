use crate::types::{Appointment, ApptStage, SavedResponse};
use serde::Serialize;

/// One kanban column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageGroup {
    pub stage: ApptStage,
    pub expected_revenue: f64,
    pub appointments: Vec<Appointment>,
}

fn matches(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .unwrap_or_default()
        .to_lowercase()
        .contains(&needle.to_lowercase())
}

/// Groups appointments by stage in pipeline order, keeping only those whose
/// customer name contains `search` (case-insensitive). Empty stages are left out.
pub fn group_by_stage(appointments: &[Appointment], search: &str) -> Vec<StageGroup> {
    let filtered: Vec<&Appointment> = appointments
        .iter()
        .filter(|appointment| matches(appointment.customer_name.as_deref(), search))
        .collect();

    ApptStage::ALL
        .into_iter()
        .filter_map(|stage| {
            let appointments: Vec<Appointment> = filtered
                .iter()
                .filter(|appointment| appointment.stage == stage)
                .map(|appointment| (*appointment).clone())
                .collect();
            if appointments.is_empty() {
                return None;
            }
            Some(StageGroup {
                stage,
                expected_revenue: appointments.iter().map(|a| a.expected_revenue).sum(),
                appointments,
            })
        })
        .collect()
}

/// Library listing: newest first, filtered by title.
pub fn filter_responses(mut responses: Vec<SavedResponse>, search: &str) -> Vec<SavedResponse> {
    responses.retain(|response| matches(Some(response.title.as_str()), search));
    responses.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
    responses
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{Category, NewAppointment};
    use uuid::Uuid;

    fn appointment(name: &str, stage: ApptStage, revenue: f64) -> Appointment {
        Appointment::from_new(NewAppointment {
            customer_name: Some(name.into()),
            stage,
            expected_revenue: revenue,
            ..NewAppointment::default()
        })
    }

    fn response(title: &str, last_updated: i64) -> SavedResponse {
        SavedResponse {
            id: Uuid::new_v4(),
            title: title.into(),
            content: String::new(),
            category: Category::General,
            last_updated,
        }
    }

    #[test]
    fn groups_follow_pipeline_order_and_skip_empty_stages() {
        let appointments = vec![
            appointment("Rita", ApptStage::Done, 300.0),
            appointment("Ana", ApptStage::Leads, 100.0),
            appointment("Bruno", ApptStage::Leads, 50.5),
        ];
        let groups = group_by_stage(&appointments, "");

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].stage, ApptStage::Leads);
        assert_eq!(groups[0].appointments.len(), 2);
        assert_eq!(groups[0].expected_revenue, 150.5);
        assert_eq!(groups[1].stage, ApptStage::Done);
    }

    #[test]
    fn search_is_case_insensitive_on_customer_name() {
        let mut unnamed = appointment("", ApptStage::Leads, 0.0);
        unnamed.customer_name = None;
        let appointments = vec![
            appointment("Ana Martins", ApptStage::Leads, 0.0),
            appointment("Bruno", ApptStage::Rework, 0.0),
            unnamed,
        ];

        let groups = group_by_stage(&appointments, "MARTINS");
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].appointments[0].customer_name.as_deref(),
            Some("Ana Martins")
        );

        let everyone: usize = group_by_stage(&appointments, "")
            .iter()
            .map(|group| group.appointments.len())
            .sum();
        assert_eq!(everyone, 3);
    }

    #[test]
    fn responses_are_newest_first() {
        let responses = vec![
            response("Orçamento fossa", 10),
            response("Pedido de fotos", 30),
            response("Orçamento canalização", 20),
        ];
        let titles: Vec<String> = filter_responses(responses.clone(), "")
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(
            titles,
            vec!["Pedido de fotos", "Orçamento canalização", "Orçamento fossa"]
        );

        let filtered = filter_responses(responses, "orçamento");
        assert_eq!(filtered.len(), 2);
    }
}
