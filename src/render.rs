//! Conversation rendering.
//!
//! Walks the session's turn log and dispatches each content block to a
//! [`Surface`]: text prints as-is, suggestions become numbered controls,
//! SQL blocks are shown and then executed through the [`QueryExecutor`]
//! with the result drawn as a table and, where the column set allows it,
//! a chart. Unrecognized blocks are skipped silently. The concrete output
//! widget toolkit stays behind the trait; [`TermSurface`] is the plain
//! terminal implementation.

use crate::chart::{self, ChartKind};
use crate::executor::QueryExecutor;
use crate::models::{format_cell, ContentBlock, Role, Table, Turn};
use crate::session::Session;

/// Shown when a statement executes successfully but returns zero rows.
pub const EMPTY_RESULT_NOTICE: &str = "Query returned no data";
/// Shown instead of a chart when the result has fewer than two columns.
pub const NOT_ENOUGH_COLUMNS_NOTICE: &str = "Not enough columns to draw a chart";

/// Output seam. One method per display primitive; implementations decide
/// how each primitive looks on their widget toolkit.
pub trait Surface {
    fn heading(&mut self, role: Role);
    fn text(&mut self, text: &str);
    fn suggestions(&mut self, items: &[String]);
    fn sql(&mut self, statement: &str);
    fn table(&mut self, table: &Table);
    fn chart(&mut self, rendered: &str);
    fn notice(&mut self, text: &str);
}

/// Axis and kind selection for chart views.
///
/// When unset, the first column is the X axis and the first remaining
/// column the Y axis, mirroring how the result's column order reads.
#[derive(Debug, Clone, Default)]
pub struct ChartOptions {
    pub kind: Option<ChartKind>,
    pub x_column: Option<String>,
    pub y_column: Option<String>,
}

/// Renders conversation state onto a surface.
pub struct Renderer<'a> {
    executor: &'a QueryExecutor,
    chart_options: ChartOptions,
}

impl<'a> Renderer<'a> {
    pub fn new(executor: &'a QueryExecutor) -> Self {
        Self {
            executor,
            chart_options: ChartOptions::default(),
        }
    }

    pub fn with_chart_options(mut self, options: ChartOptions) -> Self {
        self.chart_options = options;
        self
    }

    /// Render every turn in order.
    pub async fn render_conversation(&self, session: &Session, surface: &mut dyn Surface) {
        for turn in session.messages() {
            self.render_turn(turn, surface).await;
        }
    }

    /// Render one turn: heading then each block in content order.
    pub async fn render_turn(&self, turn: &Turn, surface: &mut dyn Surface) {
        surface.heading(turn.role);
        for block in &turn.content {
            self.render_block(block, surface).await;
        }
    }

    async fn render_block(&self, block: &ContentBlock, surface: &mut dyn Surface) {
        match block {
            ContentBlock::Text { text } => surface.text(text),
            ContentBlock::Suggestions { suggestions } => surface.suggestions(suggestions),
            ContentBlock::Sql { statement } => {
                surface.sql(statement);
                self.render_query_result(statement, surface).await;
            }
            ContentBlock::Unrecognized => {}
        }
    }

    /// Execute a SQL block and draw the outcome: engine error, empty-result
    /// notice, or table plus chart view.
    pub async fn render_query_result(&self, statement: &str, surface: &mut dyn Surface) {
        let table = match self.executor.execute(statement).await {
            Ok(table) => table,
            Err(err) => {
                surface.notice(&err.user_message());
                return;
            }
        };

        if table.is_empty() {
            surface.notice(EMPTY_RESULT_NOTICE);
            return;
        }

        surface.table(&table);
        self.render_chart(&table, surface);
    }

    fn render_chart(&self, table: &Table, surface: &mut dyn Surface) {
        if !chart::chart_available(table) {
            surface.notice(NOT_ENOUGH_COLUMNS_NOTICE);
            return;
        }

        let x = self
            .chart_options
            .x_column
            .clone()
            .unwrap_or_else(|| table.columns[0].clone());
        let y = match &self.chart_options.y_column {
            Some(column) => column.clone(),
            None => match chart::y_axis_options(&table.columns, &x).into_iter().next() {
                Some(column) => column,
                None => {
                    surface.notice(NOT_ENOUGH_COLUMNS_NOTICE);
                    return;
                }
            },
        };
        let kind = self.chart_options.kind.unwrap_or(ChartKind::Bar);

        match chart::build_chart(table, kind, &x, &y) {
            Ok(spec) => surface.chart(&chart::render_text(&spec)),
            Err(e) => surface.notice(&e.to_string()),
        }
    }
}

/// Plain-terminal surface writing to stdout.
pub struct TermSurface;

impl Surface for TermSurface {
    fn heading(&mut self, role: Role) {
        match role {
            Role::User => println!("\n[you]"),
            Role::Analyst => println!("\n[analyst]"),
        }
    }

    fn text(&mut self, text: &str) {
        println!("{}", text);
    }

    fn suggestions(&mut self, items: &[String]) {
        for (index, suggestion) in items.iter().enumerate() {
            println!("  :{}  {}", index + 1, suggestion);
        }
    }

    fn sql(&mut self, statement: &str) {
        println!("```sql\n{}\n```", statement);
    }

    fn table(&mut self, table: &Table) {
        let widths = column_widths(table);

        let header: Vec<String> = table
            .columns
            .iter()
            .zip(&widths)
            .map(|(name, &w)| format!("{:<w$}", name))
            .collect();
        println!("{}", header.join("  "));
        println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));

        for row in &table.rows {
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(value, &w)| format!("{:<w$}", format_cell(value)))
                .collect();
            println!("{}", cells.join("  "));
        }
    }

    fn chart(&mut self, rendered: &str) {
        println!("\n{}", rendered);
    }

    fn notice(&mut self, text: &str) {
        println!("! {}", text);
    }
}

fn column_widths(table: &Table) -> Vec<usize> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            table
                .rows
                .iter()
                .map(|row| row.get(i).map(|v| format_cell(v).chars().count()).unwrap_or(0))
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect()
}
