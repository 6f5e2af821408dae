use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{Alert, HistoryRecord, SubjectId};
use crate::scoring::{Tendency, TENDENCY_THRESHOLD};

const UNKNOWN_SUBJECT: &str = "desconhecido";

#[derive(Debug, Clone, PartialEq)]
pub struct TendencySummary {
    pub tendency: Tendency,
    pub count: usize,
}

fn subject_key(subject_id: Option<SubjectId>) -> String {
    subject_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| UNKNOWN_SUBJECT.to_string())
}

/// Minimum occurrences of a tendency in one subject's history that raise an
/// alert, and the message shown for it.
fn recurrence_rule(tendency: Tendency) -> Option<(usize, &'static str)> {
    match tendency {
        Tendency::Depression => Some((
            1,
            "Padrão de humor compatível com depressão detectado no histórico.",
        )),
        Tendency::Anxiety => Some((2, "Padrão recorrente de ansiedade detectado.")),
        Tendency::Attention => Some((
            3,
            "Possível padrão consistente de sintomas relacionados a TDAH.",
        )),
        Tendency::None => None,
    }
}

fn is_distress(record: &HistoryRecord) -> bool {
    record.emotion.to_lowercase().contains("triste")
        || record.scores.depression >= TENDENCY_THRESHOLD
}

pub fn build_alerts(records: &[HistoryRecord]) -> Vec<Alert> {
    let mut by_subject: BTreeMap<String, BTreeMap<&'static str, (Tendency, usize)>> =
        BTreeMap::new();

    for record in records {
        let entry = by_subject
            .entry(subject_key(record.subject_id))
            .or_default()
            .entry(record.tendency.label())
            .or_insert((record.tendency, 0));
        entry.1 += 1;
    }

    let mut alerts = Vec::new();

    for (subject, counts) in by_subject {
        for (tendency, count) in counts.into_values() {
            let Some((minimum, message)) = recurrence_rule(tendency) else {
                continue;
            };
            if count >= minimum {
                alerts.push(Alert {
                    subject: subject.clone(),
                    message: message.to_string(),
                    tendency: tendency.label().to_string(),
                    registro_id: None,
                    occurrences: Some(count),
                });
            }
        }
    }

    for record in records.iter().filter(|r| is_distress(r)) {
        alerts.push(Alert {
            subject: subject_key(record.subject_id),
            message: "Registro com sinal de sofrimento (emoção/pontuação).".to_string(),
            tendency: record.tendency.label().to_string(),
            registro_id: Some(record.id),
            occurrences: None,
        });
    }

    let mut seen = HashSet::new();
    alerts.retain(|a| {
        seen.insert((
            a.subject.clone(),
            a.message.clone(),
            a.tendency.clone(),
            a.registro_id,
            a.occurrences,
        ))
    });
    alerts
}

pub fn summarize_by_tendency(records: &[HistoryRecord]) -> Vec<TendencySummary> {
    let mut map: BTreeMap<&'static str, (Tendency, usize)> = BTreeMap::new();

    for record in records {
        map.entry(record.tendency.label())
            .or_insert((record.tendency, 0))
            .1 += 1;
    }

    let mut summaries: Vec<TendencySummary> = map
        .into_values()
        .map(|(tendency, count)| TendencySummary { tendency, count })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

pub fn build_report(
    subject: Option<SubjectId>,
    generated_at: DateTime<Utc>,
    records: &[HistoryRecord],
) -> String {
    let summaries = summarize_by_tendency(records);
    let alerts = build_alerts(records);

    let mut output = String::new();
    let subject_label = subject
        .map(|id| format!("aluno {id}"))
        .unwrap_or_else(|| "todos os alunos".to_string());

    let _ = writeln!(output, "# Relatório do Diário Emocional");
    let _ = writeln!(
        output,
        "Gerado para {} em {} ({} registros)",
        subject_label,
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        records.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Tendências");

    if summaries.is_empty() {
        let _ = writeln!(output, "Nenhum registro encontrado.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} registros",
                summary.tendency.label(),
                summary.count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alertas");

    if alerts.is_empty() {
        let _ = writeln!(output, "Nenhum alerta.");
    } else {
        for alert in alerts.iter() {
            let _ = writeln!(
                output,
                "- aluno {}: {} ({})",
                alert.subject, alert.message, alert.tendency
            );
        }
    }

    let mut recent: Vec<&HistoryRecord> = records.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Registros Recentes");

    if recent.is_empty() {
        let _ = writeln!(output, "Nenhum registro encontrado.");
    } else {
        for record in recent.iter().take(5) {
            let when = record
                .created_at
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "sem data".to_string());
            let _ = writeln!(
                output,
                "- aluno {} em {}: {} / {}",
                subject_key(record.subject_id),
                when,
                record.emotion,
                record.tendency.label()
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::tests::sample_record;

    fn record(subject: Option<SubjectId>, tendency: Tendency) -> HistoryRecord {
        sample_record(subject, tendency)
    }

    #[test]
    fn single_depression_record_raises_subject_alert() {
        let records = vec![record(Some(1), Tendency::Depression)];
        let alerts = build_alerts(&records);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subject, "1");
        assert_eq!(alerts[0].occurrences, Some(1));
        assert!(alerts[0].message.contains("depressão"));
    }

    #[test]
    fn anxiety_and_attention_need_recurrence() {
        let mut records = vec![
            record(Some(2), Tendency::Anxiety),
            record(Some(3), Tendency::Attention),
            record(Some(3), Tendency::Attention),
        ];
        assert!(build_alerts(&records).is_empty());

        records.push(record(Some(2), Tendency::Anxiety));
        records.push(record(Some(3), Tendency::Attention));
        let alerts = build_alerts(&records);

        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().any(|a| a.subject == "2" && a.occurrences == Some(2)));
        assert!(alerts.iter().any(|a| a.subject == "3" && a.occurrences == Some(3)));
    }

    #[test]
    fn distress_records_alert_individually() {
        let mut sad = record(None, Tendency::None);
        sad.emotion = "triste".to_string();
        let mut high = record(Some(4), Tendency::Attention);
        high.scores.depression = 4;
        let calm = record(Some(5), Tendency::None);

        let alerts = build_alerts(&[sad.clone(), high.clone(), calm]);

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].subject, UNKNOWN_SUBJECT);
        assert_eq!(alerts[0].registro_id, Some(sad.id));
        assert_eq!(alerts[1].registro_id, Some(high.id));
    }

    #[test]
    fn summary_counts_tendencies() {
        let records = vec![
            record(Some(1), Tendency::None),
            record(Some(1), Tendency::None),
            record(Some(2), Tendency::Anxiety),
        ];
        let summaries = summarize_by_tendency(&records);

        assert_eq!(summaries[0], TendencySummary { tendency: Tendency::None, count: 2 });
        assert_eq!(summaries[1].count, 1);
    }

    #[test]
    fn report_lists_sections() {
        let records = vec![record(Some(1), Tendency::Depression)];
        let report = build_report(Some(1), Utc::now(), &records);

        assert!(report.starts_with("# Relatório do Diário Emocional"));
        assert!(report.contains("Gerado para aluno 1"));
        assert!(report.contains("- Tendência à Depressão leve: 1 registros"));
        assert!(report.contains("## Alertas"));
        assert!(report.contains("## Registros Recentes"));

        let empty = build_report(None, Utc::now(), &[]);
        assert!(empty.contains("todos os alunos"));
        assert!(empty.contains("Nenhum alerta."));
    }
}
