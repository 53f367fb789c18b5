use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::domain::{Assembly, AssemblyMinutes, Attendee, DigitalSignature, QuorumStatus, Voting, VotingStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("minutes {0} have no content to render")]
    EmptyContent(u64),
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
}

/// Turns rendered minutes into a stored document and returns its URL.
pub trait DocumentRenderer: Send + Sync {
    fn render_pdf(
        &self,
        assembly: &Assembly,
        minutes: &AssemblyMinutes,
    ) -> Result<String, DocumentError>;
}

/// Files documents under a URL prefix without rasterizing them.
#[derive(Debug, Clone)]
pub struct StoredDocumentRenderer {
    base_url: String,
}

impl StoredDocumentRenderer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl DocumentRenderer for StoredDocumentRenderer {
    fn render_pdf(
        &self,
        assembly: &Assembly,
        minutes: &AssemblyMinutes,
    ) -> Result<String, DocumentError> {
        if minutes.content.as_deref().map_or(true, str::is_empty) {
            return Err(DocumentError::EmptyContent(minutes.id));
        }
        Ok(format!(
            "{}/assemblies/{id}/minutes/acta_asamblea_{id}_{ts}.pdf",
            self.base_url,
            id = assembly.id,
            ts = Utc::now().timestamp_millis()
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("document has not been rendered yet")]
    MissingDocument,
    #[error("signature service unavailable: {0}")]
    Unavailable(String),
}

/// Inputs bound into a signer's signature.
#[derive(Debug, Clone, Copy)]
pub struct SignatureRequest<'a> {
    pub document: &'a str,
    pub signer_user_id: u64,
    pub role: &'a str,
    pub timestamp: DateTime<Utc>,
}

pub trait SignatureProvider: Send + Sync {
    fn sign(&self, request: &SignatureRequest<'_>) -> Result<String, SignatureError>;

    /// URL of the document carrying every collected signature.
    fn signed_document(
        &self,
        pdf_url: &str,
        signatures: &[DigitalSignature],
    ) -> Result<String, SignatureError>;
}

/// SHA-256 digests standing in for certificate-backed signatures.
#[derive(Debug, Default)]
pub struct Sha256Signer;

impl SignatureProvider for Sha256Signer {
    fn sign(&self, request: &SignatureRequest<'_>) -> Result<String, SignatureError> {
        let mut hasher = Sha256::new();
        hasher.update(request.document.as_bytes());
        hasher.update(b"|");
        hasher.update(request.signer_user_id.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(request.role.as_bytes());
        hasher.update(b"|");
        hasher.update(request.timestamp.to_rfc3339().as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn signed_document(
        &self,
        pdf_url: &str,
        signatures: &[DigitalSignature],
    ) -> Result<String, SignatureError> {
        if pdf_url.is_empty() {
            return Err(SignatureError::MissingDocument);
        }
        let mut hasher = Sha256::new();
        for signature in signatures {
            hasher.update(signature.signature_data.as_deref().unwrap_or_default().as_bytes());
        }
        let digest = format!("{:x}", hasher.finalize());
        let stem = pdf_url.strip_suffix(".pdf").unwrap_or(pdf_url);
        Ok(format!("{stem}_firmada_{}.pdf", &digest[..12]))
    }
}

fn percent(value: f64) -> String {
    format!("{value:.2}%")
}

/// Markdown body of the minutes for a completed assembly.
pub fn render_minutes(assembly: &Assembly, attendees: &[Attendee], votings: &[Voting]) -> String {
    let mut doc = String::new();
    let end_time = assembly
        .end_time
        .map(|end| end.format("%H:%M").to_string())
        .unwrap_or_else(|| "No registrada".to_string());

    let _ = writeln!(doc, "# Acta de Asamblea: {}\n", assembly.title);
    let _ = writeln!(doc, "**Fecha:** {}", assembly.date.format("%Y-%m-%d"));
    let _ = writeln!(doc, "**Hora de inicio:** {}", assembly.date.format("%H:%M"));
    let _ = writeln!(doc, "**Hora de finalización:** {end_time}");
    let _ = writeln!(doc, "**Lugar:** {}\n", assembly.location);

    let _ = writeln!(doc, "## Quórum\n");
    let _ = writeln!(doc, "Coeficiente requerido: {}", percent(assembly.required_coefficient));
    let _ = writeln!(doc, "Coeficiente presente: {}", percent(assembly.current_coefficient));
    let quorum = match assembly.quorum_status {
        QuorumStatus::Reached => "ALCANZADO",
        QuorumStatus::NotReached => "NO ALCANZADO",
    };
    let _ = writeln!(doc, "Estado del quórum: {quorum}\n");

    let _ = writeln!(doc, "## Asistentes\n");
    let _ = writeln!(doc, "Total de asistentes: {}\n", attendees.len());
    let _ = writeln!(doc, "| Unidad | Coeficiente | Tipo de Asistencia |");
    let _ = writeln!(doc, "|--------|-------------|--------------------|");
    for attendee in attendees {
        let _ = writeln!(
            doc,
            "| Unidad {} | {} | {} |",
            attendee.property_unit_id,
            percent(attendee.coefficient),
            attendee.attendance_type.label()
        );
    }

    let _ = writeln!(doc, "\n## Agenda\n");
    for (index, item) in assembly.agenda.iter().enumerate() {
        let point = index as u32 + 1;
        let _ = writeln!(doc, "### {point}. {}\n", item.topic);
        if let Some(description) = &item.description {
            let _ = writeln!(doc, "{description}\n");
        }

        let related: Vec<&Voting> = votings
            .iter()
            .filter(|voting| voting.agenda_point == point)
            .collect();
        if related.is_empty() {
            continue;
        }
        let _ = writeln!(doc, "**Votaciones:**\n");
        for voting in related {
            let _ = writeln!(doc, "#### {}\n", voting.title);
            if let Some(description) = &voting.description {
                let _ = writeln!(doc, "{description}\n");
            }
            let _ = writeln!(doc, "**Tipo de votación:** {}", voting.voting_type.label());
            let _ = writeln!(doc, "**Estado:** {}", voting.status.label());
            if voting.status == VotingStatus::Closed {
                let outcome = if voting.is_approved == Some(true) {
                    "APROBADO"
                } else {
                    "NO APROBADO"
                };
                let _ = writeln!(doc, "**Resultado:** {outcome}\n");
                let _ = writeln!(doc, "| Opción | Votos | Coeficiente |");
                let _ = writeln!(doc, "|--------|-------|-------------|");
                for option in &voting.options {
                    let tally = voting.result.get(option).copied().unwrap_or_default();
                    let _ = writeln!(
                        doc,
                        "| {option} | {} | {} |",
                        tally.count,
                        percent(tally.coefficient)
                    );
                }
            }
            doc.push('\n');
        }
    }

    let _ = writeln!(doc, "## Firmas\n");
    let _ = writeln!(
        doc,
        "Este documento requiere la firma digital del presidente y secretario de la asamblea."
    );
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::domain::{
        AgendaItem, AssemblyStatus, AssemblyType, AttendanceType, OptionTally, PercentageBase,
        VotingType,
    };
    use crate::assembly::rules::default_options;
    use chrono::TimeZone;

    fn assembly() -> Assembly {
        let date = Utc.with_ymd_and_hms(2026, 3, 14, 19, 0, 0).single().expect("valid date");
        Assembly {
            id: 4,
            title: "Asamblea ordinaria 2026".to_string(),
            description: None,
            assembly_type: AssemblyType::Ordinary,
            status: AssemblyStatus::Completed,
            date,
            location: "Salón comunal".to_string(),
            agenda: vec![
                AgendaItem {
                    topic: "Presupuesto".to_string(),
                    description: None,
                },
                AgendaItem {
                    topic: "Varios".to_string(),
                    description: None,
                },
            ],
            required_coefficient: 50.0,
            current_coefficient: 62.5,
            quorum_status: QuorumStatus::Reached,
            quorum_reached_at: Some(date),
            realtime_channel: "assembly-tenant_a-4".to_string(),
            created_by: 1,
            end_time: None,
            conclusions: None,
            created_at: date,
            updated_at: date,
        }
    }

    fn closed_voting() -> Voting {
        let mut result = std::collections::BTreeMap::new();
        result.insert(
            "Sí".to_string(),
            OptionTally {
                count: 3,
                coefficient: 45.0,
            },
        );
        Voting {
            id: 1,
            assembly_id: 4,
            agenda_point: 1,
            title: "Aprobación del presupuesto".to_string(),
            description: None,
            voting_type: VotingType::SimpleMajority,
            options: default_options(),
            required_percentage: None,
            base_for_percentage: PercentageBase::default(),
            status: VotingStatus::Closed,
            start_time: None,
            end_time: None,
            total_votes: 3,
            total_coefficient_voted: 45.0,
            result,
            is_approved: Some(true),
        }
    }

    #[test]
    fn minutes_cover_quorum_attendance_and_votings() {
        let attendee = Attendee {
            id: 1,
            assembly_id: 4,
            user_id: 10,
            property_unit_id: 101,
            coefficient: 12.5,
            attendance_type: AttendanceType::InPerson,
            proxy_user_id: None,
            proxy_document_url: None,
            ip_address: None,
            user_agent: None,
            checked_in_at: Utc::now(),
        };
        let content = render_minutes(&assembly(), &[attendee], &[closed_voting()]);

        assert!(content.starts_with("# Acta de Asamblea: Asamblea ordinaria 2026"));
        assert!(content.contains("**Fecha:** 2026-03-14"));
        assert!(content.contains("**Hora de finalización:** No registrada"));
        assert!(content.contains("Estado del quórum: ALCANZADO"));
        assert!(content.contains("| Unidad 101 | 12.50% | IN_PERSON |"));
        assert!(content.contains("### 1. Presupuesto"));
        assert!(content.contains("**Resultado:** APROBADO"));
        assert!(content.contains("| Sí | 3 | 45.00% |"));
        assert!(content.contains("| No | 0 | 0.00% |"));
        assert!(content.contains("### 2. Varios"));
        assert!(content.contains("## Firmas"));
    }

    #[test]
    fn renderer_builds_document_url_under_base() {
        let renderer = StoredDocumentRenderer::new("/api/documents/");
        let mut minutes = AssemblyMinutes {
            id: 9,
            assembly_id: 4,
            status: crate::assembly::domain::MinutesStatus::Generated,
            content: None,
            pdf_url: None,
            signed_pdf_url: None,
            signatures_required: 2,
            signatures_completed: 0,
            generated_at: None,
            generation_log: None,
        };
        assert_eq!(
            renderer.render_pdf(&assembly(), &minutes),
            Err(DocumentError::EmptyContent(9))
        );

        minutes.content = Some("# Acta".to_string());
        let url = renderer.render_pdf(&assembly(), &minutes).expect("url");
        assert!(url.starts_with("/api/documents/assemblies/4/minutes/acta_asamblea_4_"));
        assert!(url.ends_with(".pdf"));
    }

    #[test]
    fn signatures_are_deterministic_sha256_digests() {
        let timestamp = Utc.with_ymd_and_hms(2026, 3, 15, 9, 30, 0).single().expect("valid date");
        let request = SignatureRequest {
            document: "/api/documents/assemblies/4/minutes/acta.pdf",
            signer_user_id: 7,
            role: "PRESIDENTE",
            timestamp,
        };
        let first = Sha256Signer.sign(&request).expect("signature");
        let second = Sha256Signer.sign(&request).expect("signature");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);

        let other = Sha256Signer
            .sign(&SignatureRequest {
                signer_user_id: 8,
                ..request
            })
            .expect("signature");
        assert_ne!(first, other);
    }
}
