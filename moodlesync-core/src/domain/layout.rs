// moodlesync-core/src/domain/layout.rs
//
// Spreadsheet layout: A1 holds the last-run stamp, the table is anchored at B1, and a separate
// tab collects one row per execution.

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;

use crate::domain::reconcile::{Contribution, UnifiedTable};
use crate::domain::record::{SourceKind, SourceValue};

pub const TIMESTAMP_CELL: &str = "A1";
pub const TABLE_ANCHOR: &str = "B1";
pub const DEFAULT_HISTORY_TAB: &str = "Historial";

pub const NAME_HEADER: &str = "Nombre Completo";
pub const EMAIL_HEADER: &str = "Email";

const DATE_SUBHEADER: &str = "Fecha";
const DELIVERABLE_SUBHEADERS: [&str; 3] = ["Estado", "Calificación", "Entregado"];

/// Rows of cells, header first.
pub type Grid = Vec<Vec<String>>;

pub fn format_run_at<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Current local time, formatted like every stamp the job writes.
pub fn local_run_at() -> String {
    format_run_at(&Local::now())
}

pub fn stamp_text(run_at: &str) -> String {
    format!("Actualizado el: {}", run_at)
}

pub fn history_row(run_at: &str) -> Vec<String> {
    vec!["Ejecución registrada el:".to_string(), run_at.to_string()]
}

/// Shape of the columns one source occupies in the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanShape {
    Survey { dated: bool, answers: usize },
    Deliverable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpan {
    pub position: usize,
    pub label: String,
    pub shape: SpanShape,
}

impl ColumnSpan {
    pub fn width(&self) -> usize {
        match self.shape {
            SpanShape::Survey { dated, answers } => answers + usize::from(dated),
            SpanShape::Deliverable => DELIVERABLE_SUBHEADERS.len(),
        }
    }

    pub fn headers(&self) -> Vec<String> {
        let subs: Vec<String> = match self.shape {
            SpanShape::Survey { dated, answers } => {
                let mut subs = Vec::with_capacity(self.width());
                if dated {
                    subs.push(DATE_SUBHEADER.to_string());
                }
                subs.extend((1..=answers).map(|n| format!("Pregunta {}", n)));
                subs
            }
            SpanShape::Deliverable => DELIVERABLE_SUBHEADERS.iter().map(|s| s.to_string()).collect(),
        };

        if subs.len() == 1 {
            return vec![self.label.clone()];
        }
        subs.into_iter()
            .map(|sub| format!("{} - {}", self.label, sub))
            .collect()
    }

    pub fn cells(&self, contribution: Option<&Contribution>) -> Vec<String> {
        let mut cells = match (&self.shape, contribution) {
            (_, None) => Vec::new(),
            (SpanShape::Survey { dated, .. }, Some(c)) => {
                let mut cells = Vec::with_capacity(self.width());
                if *dated {
                    cells.push(c.timestamp.clone().unwrap_or_default());
                }
                if let SourceValue::Survey(s) = &c.value {
                    cells.extend(s.answers.iter().cloned());
                }
                cells
            }
            (SpanShape::Deliverable, Some(c)) => match &c.value {
                SourceValue::Deliverable(d) => {
                    vec![d.status.clone(), d.grade.clone(), d.submitted_at.clone()]
                }
                SourceValue::Survey(_) => Vec::new(),
            },
        };
        cells.resize(self.width(), String::new());
        cells
    }
}

/// Column spans in plan order, sized from the data actually present.
pub fn column_spans(table: &UnifiedTable) -> Vec<ColumnSpan> {
    table
        .plan()
        .sources()
        .iter()
        .map(|spec| {
            let shape = match spec.kind {
                SourceKind::Deliverable => SpanShape::Deliverable,
                SourceKind::Survey => {
                    let contributions = table.rows().iter().filter_map(|r| r.contribution(spec.position));
                    let mut dated = false;
                    let mut answers = 0;
                    for c in contributions {
                        dated |= c.timestamp.is_some();
                        if let SourceValue::Survey(s) = &c.value {
                            answers = answers.max(s.answers.len());
                        }
                    }
                    SpanShape::Survey {
                        dated,
                        answers: answers.max(1),
                    }
                }
            };
            ColumnSpan {
                position: spec.position,
                label: spec.label.clone(),
                shape,
            }
        })
        .collect()
}

/// Header plus one line per user, ready to be written at [`TABLE_ANCHOR`].
pub fn render_grid(table: &UnifiedTable) -> Grid {
    let spans = column_spans(table);

    let mut header = vec![NAME_HEADER.to_string(), EMAIL_HEADER.to_string()];
    for span in &spans {
        header.extend(span.headers());
    }

    let mut grid = Vec::with_capacity(table.len() + 1);
    grid.push(header);
    for row in table.rows() {
        let mut line = vec![row.full_name.clone(), row.email.clone()];
        for span in &spans {
            line.extend(span.cells(row.contribution(span.position)));
        }
        grid.push(line);
    }
    grid
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::plan::SourcePlan;
    use crate::domain::reconcile::Reconciler;
    use crate::domain::record::{DeliverableStatus, SourceRecord};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_single_answer_surveys_use_bare_labels() -> anyhow::Result<()> {
        let plan = SourcePlan::from_lists(SourceKind::Survey, "S1,S2", "Q1,Q2")?;
        let mut rec = Reconciler::new(&plan);
        rec.absorb(
            0,
            vec![SourceRecord::new("a@x.com", "Ana", SourceValue::survey(["yes"]))],
        )?;
        rec.absorb(
            1,
            vec![
                SourceRecord::new("a@x.com", "Ana", SourceValue::survey(["no"])),
                SourceRecord::new("b@x.com", "Ben", SourceValue::survey(["yes"])),
            ],
        )?;
        let grid = render_grid(&rec.finish());

        assert_eq!(
            grid,
            vec![
                row(&["Nombre Completo", "Email", "Q1", "Q2"]),
                row(&["Ana", "a@x.com", "yes", "no"]),
                row(&["Ben", "b@x.com", "", "yes"]),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_dated_multi_answer_survey() -> anyhow::Result<()> {
        let plan = SourcePlan::from_lists(SourceKind::Survey, "7", "Final")?;
        let mut rec = Reconciler::new(&plan);
        rec.absorb(
            0,
            vec![
                SourceRecord::new("a@x.com", "Ana", SourceValue::survey(["G1", "5", "Bien"]))
                    .with_timestamp("2024-05-01"),
                SourceRecord::new("b@x.com", "Ben", SourceValue::survey(["G2"])),
            ],
        )?;
        let grid = render_grid(&rec.finish());

        assert_eq!(
            grid[0],
            row(&[
                "Nombre Completo",
                "Email",
                "Final - Fecha",
                "Final - Pregunta 1",
                "Final - Pregunta 2",
                "Final - Pregunta 3",
            ])
        );
        assert_eq!(grid[1], row(&["Ana", "a@x.com", "2024-05-01", "G1", "5", "Bien"]));
        assert_eq!(grid[2], row(&["Ben", "b@x.com", "", "G2", "", ""]));
        Ok(())
    }

    #[test]
    fn test_deliverable_columns() -> anyhow::Result<()> {
        let plan = SourcePlan::from_lists(SourceKind::Deliverable, "11,12", "E1,E2")?;
        let mut rec = Reconciler::new(&plan);
        rec.absorb(
            1,
            vec![SourceRecord::new(
                "a@x.com",
                "Ana",
                SourceValue::Deliverable(DeliverableStatus {
                    status: "Enviado para calificar".into(),
                    grade: "9,50".into(),
                    submitted_at: "lunes, 6 de mayo de 2024".into(),
                }),
            )],
        )?;
        let grid = render_grid(&rec.finish());

        assert_eq!(grid[0].len(), 2 + 6);
        assert_eq!(grid[0][2], "E1 - Estado");
        assert_eq!(grid[0][7], "E2 - Entregado");
        assert_eq!(
            grid[1],
            row(&[
                "Ana",
                "a@x.com",
                "",
                "",
                "",
                "Enviado para calificar",
                "9,50",
                "lunes, 6 de mayo de 2024",
            ])
        );
        Ok(())
    }

    #[test]
    fn test_empty_table_still_has_header() -> anyhow::Result<()> {
        let plan = SourcePlan::from_lists(SourceKind::Survey, "1", "Q1")?;
        let grid = render_grid(&Reconciler::new(&plan).finish());
        assert_eq!(grid, vec![row(&["Nombre Completo", "Email", "Q1"])]);
        Ok(())
    }

    #[test]
    fn test_stamp_and_history_text() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        let ts = format_run_at(&at);
        assert_eq!(ts, "2024-03-09 07:05:00");
        assert_eq!(stamp_text(&ts), "Actualizado el: 2024-03-09 07:05:00");
        assert_eq!(
            history_row(&ts),
            row(&["Ejecución registrada el:", "2024-03-09 07:05:00"])
        );
    }
}
