use crate::time_window::TimeOfDay;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApptStage {
    #[default]
    Leads,
    #[serde(rename = "Visita Técnica")]
    TechnicalVisit,
    #[serde(rename = "Orçamentos a Fazer")]
    QuotesToDo,
    #[serde(rename = "Relatórios a Fazer")]
    ReportsToDo,
    #[serde(rename = "Aguardando Resposta")]
    AwaitingReply,
    #[serde(rename = "Serviços a Fazer")]
    ServicesToDo,
    #[serde(rename = "Em Execução")]
    InProgress,
    #[serde(rename = "Retrabalho")]
    Rework,
    #[serde(rename = "A Receber")]
    Receivable,
    #[serde(rename = "Concluído")]
    Done,
    #[serde(rename = "Recusados")]
    Refused,
}

impl ApptStage {
    /// Pipeline columns, left to right.
    pub const ALL: [ApptStage; 11] = [
        ApptStage::Leads,
        ApptStage::TechnicalVisit,
        ApptStage::QuotesToDo,
        ApptStage::ReportsToDo,
        ApptStage::AwaitingReply,
        ApptStage::ServicesToDo,
        ApptStage::InProgress,
        ApptStage::Rework,
        ApptStage::Receivable,
        ApptStage::Done,
        ApptStage::Refused,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ApptStage::Leads => "Leads",
            ApptStage::TechnicalVisit => "Visita Técnica",
            ApptStage::QuotesToDo => "Orçamentos a Fazer",
            ApptStage::ReportsToDo => "Relatórios a Fazer",
            ApptStage::AwaitingReply => "Aguardando Resposta",
            ApptStage::ServicesToDo => "Serviços a Fazer",
            ApptStage::InProgress => "Em Execução",
            ApptStage::Rework => "Retrabalho",
            ApptStage::Receivable => "A Receber",
            ApptStage::Done => "Concluído",
            ApptStage::Refused => "Recusados",
        }
    }
}

impl fmt::Display for ApptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApptStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApptStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("Unknown stage: {s}"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    #[default]
    #[serde(rename = "Pendente")]
    Pending,
    #[serde(rename = "Concluído")]
    Completed,
    #[serde(rename = "Cancelado")]
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pendente",
            AppointmentStatus::Completed => "Concluído",
            AppointmentStatus::Cancelled => "Cancelado",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            AppointmentStatus::Pending,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
        ]
        .into_iter()
        .find(|status| status.as_str() == s)
        .ok_or_else(|| format!("Unknown status: {s}"))
    }
}

/// A lead or scheduled service visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub customer_name: Option<String>,
    pub company_name: Option<String>,
    pub service_type: String,
    /// Service address.
    pub description: String,
    pub notes: Option<String>,
    pub scheduled_at: NaiveDate,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub status: AppointmentStatus,
    pub price: f64,
    pub stage: ApptStage,
    pub expected_revenue: f64,
    pub probability: i32,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub nif: Option<String>,
    pub tech_sent_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn from_new(new: NewAppointment) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_name: new.customer_name,
            company_name: new.company_name,
            service_type: new.service_type,
            description: new.description,
            notes: new.notes,
            scheduled_at: new.scheduled_at,
            start_time: new.start_time,
            end_time: new.end_time,
            status: AppointmentStatus::Pending,
            price: new.price,
            stage: new.stage,
            expected_revenue: new.expected_revenue,
            probability: new.probability,
            phone: new.phone,
            email: new.email,
            nif: new.nif,
            tech_sent_at: None,
        }
    }

    /// Sort key: date, then start time by clock value. A missing or
    /// unparseable start sorts first.
    pub fn schedule_key(&self) -> (NaiveDate, Option<TimeOfDay>) {
        let start = self
            .start_time
            .as_deref()
            .and_then(|start| TimeOfDay::parse(start).ok());
        (self.scheduled_at, start)
    }

    /// Name shown when this appointment blocks a slot.
    pub fn label(&self) -> String {
        match self.customer_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.service_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub customer_name: Option<String>,
    pub company_name: Option<String>,
    pub service_type: String,
    pub description: String,
    pub notes: Option<String>,
    pub scheduled_at: NaiveDate,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub price: f64,
    pub stage: ApptStage,
    pub expected_revenue: f64,
    pub probability: i32,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub nif: Option<String>,
}

impl Default for NewAppointment {
    fn default() -> Self {
        Self {
            customer_name: None,
            company_name: None,
            service_type: "Pesquisa de Fuga".into(),
            description: String::new(),
            notes: None,
            scheduled_at: Utc::now().date_naive(),
            start_time: None,
            end_time: None,
            price: 0.0,
            stage: ApptStage::Leads,
            expected_revenue: 0.0,
            probability: 0,
            phone: None,
            email: None,
            nif: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Orçamento")]
    Quote,
    #[serde(rename = "Pesquisa de Fuga")]
    LeakDetection,
    #[serde(rename = "Desentupimentos")]
    Unclogging,
    #[serde(rename = "Serviços")]
    Services,
    #[default]
    #[serde(rename = "Geral")]
    General,
    #[serde(rename = "Outros")]
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Quote => "Orçamento",
            Category::LeakDetection => "Pesquisa de Fuga",
            Category::Unclogging => "Desentupimentos",
            Category::Services => "Serviços",
            Category::General => "Geral",
            Category::Other => "Outros",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Category::Quote,
            Category::LeakDetection,
            Category::Unclogging,
            Category::Services,
            Category::General,
            Category::Other,
        ]
        .into_iter()
        .find(|category| category.as_str() == s)
        .ok_or_else(|| format!("Unknown category: {s}"))
    }
}

/// Canned reply from the response library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: Category,
    /// Milliseconds since the Unix epoch.
    pub last_updated: i64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stage_labels_round_trip() {
        for stage in ApptStage::ALL {
            assert_eq!(stage.as_str().parse::<ApptStage>().unwrap(), stage);
            assert_eq!(
                serde_json::to_value(stage).unwrap(),
                serde_json::Value::String(stage.as_str().into())
            );
        }
        assert!("Arquivado".parse::<ApptStage>().is_err());
    }

    #[test]
    fn status_and_category_use_portuguese_labels() {
        assert_eq!(
            serde_json::to_string(&AppointmentStatus::Cancelled).unwrap(),
            "\"Cancelado\""
        );
        assert_eq!(
            serde_json::from_str::<Category>("\"Pesquisa de Fuga\"").unwrap(),
            Category::LeakDetection
        );
        assert_eq!("Geral".parse::<Category>().unwrap(), Category::General);
    }

    #[test]
    fn label_falls_back_to_service_type() {
        let mut appointment = Appointment::from_new(NewAppointment {
            customer_name: Some("  ".into()),
            service_type: "Desentupimentos".into(),
            ..NewAppointment::default()
        });
        assert_eq!(appointment.label(), "Desentupimentos");

        appointment.customer_name = Some("Carla Sousa".into());
        assert_eq!(appointment.label(), "Carla Sousa");
    }

    #[test]
    fn new_appointments_start_pending_in_leads() {
        let appointment = Appointment::from_new(NewAppointment::default());
        assert_eq!(appointment.status, AppointmentStatus::Pending);
        assert_eq!(appointment.stage, ApptStage::Leads);
        assert!(appointment.tech_sent_at.is_none());
    }

    #[test]
    fn schedule_key_orders_by_clock_time() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let at = |start: Option<&str>| {
            Appointment::from_new(NewAppointment {
                scheduled_at: date,
                start_time: start.map(Into::into),
                ..NewAppointment::default()
            })
        };

        assert!(at(Some("9:00")).schedule_key() < at(Some("10:00")).schedule_key());
        assert!(at(None).schedule_key() < at(Some("00:30")).schedule_key());
        assert_eq!(
            at(Some("9:00")).schedule_key(),
            at(Some("09:00:00")).schedule_key()
        );
    }
}
