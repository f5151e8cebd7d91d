use crate::{Block, Cell, TableStyle};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_TABLE_DIM: usize = 3;
pub const MAX_TABLE_ROWS: usize = 50;
pub const MAX_TABLE_COLS: usize = 20;

/// Table shape requested from the table dialog. `rows` counts the header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRequest {
    pub rows: usize,
    pub cols: usize,
    pub header: bool,
    pub style: TableStyle,
    pub responsive: bool,
}

fn parse_dim(raw: &str, max: usize) -> usize {
    match raw.trim().parse::<i64>() {
        Ok(n) if n > 0 => (n as usize).min(max),
        _ => DEFAULT_TABLE_DIM,
    }
}

impl TableRequest {
    pub fn from_input(rows: &str, cols: &str, header: bool, style: TableStyle, responsive: bool) -> Self {
        Self {
            rows: parse_dim(rows, MAX_TABLE_ROWS),
            cols: parse_dim(cols, MAX_TABLE_COLS),
            header,
            style,
            responsive,
        }
    }
}

impl Default for TableRequest {
    fn default() -> Self {
        Self {
            rows: DEFAULT_TABLE_DIM,
            cols: DEFAULT_TABLE_DIM,
            header: true,
            style: TableStyle::Default,
            responsive: false,
        }
    }
}

fn header_cell(col: usize) -> Cell {
    Cell::with_text(&format!("Header {}", col + 1))
}

fn body_cell(row: usize, col: usize) -> Cell {
    Cell::with_text(&format!("Cell {}-{}", row + 1, col + 1))
}

#[derive(Debug, Default)]
pub struct TableEditor;

impl TableEditor {
    pub fn build(request: &TableRequest) -> Block {
        let body_rows = if request.header { request.rows.saturating_sub(1) } else { request.rows };
        let mut rows = Vec::with_capacity(request.rows);
        if request.header {
            rows.push((0..request.cols).map(header_cell).collect());
        }
        for r in 0..body_rows {
            rows.push((0..request.cols).map(|c| body_cell(r, c)).collect());
        }
        Block::Table {
            id: Uuid::new_v4(),
            rows,
            header: request.header,
            style: request.style,
            responsive: request.responsive,
            dirty: true,
        }
    }

    /// Applies a re-edit: existing cells keep their content, new rows and
    /// columns are filled with placeholders, surplus ones are dropped.
    pub fn apply(block: &mut Block, request: &TableRequest) -> bool {
        let Block::Table { rows, header, style, responsive, dirty, .. } = block else {
            return false;
        };
        *header = request.header;
        *style = request.style;
        *responsive = request.responsive;
        let target_rows = request.rows.max(1);
        let target_cols = request.cols.max(1);
        rows.truncate(target_rows);
        while rows.len() < target_rows {
            let index = rows.len();
            rows.push((0..target_cols).map(|c| body_cell(index, c)).collect());
        }
        for (r, row) in rows.iter_mut().enumerate() {
            row.truncate(target_cols);
            while row.len() < target_cols {
                let c = row.len();
                row.push(if r == 0 && request.header { header_cell(c) } else { body_cell(r, c) });
            }
        }
        *dirty = true;
        true
    }

    pub fn insert_row(block: &mut Block, index: usize) -> bool {
        if let Block::Table { rows, dirty, .. } = block {
            let cols = rows.first().map(|r| r.len()).unwrap_or(1);
            let row = (0..cols).map(|_| Cell::with_text("")).collect();
            let idx = index.min(rows.len());
            rows.insert(idx, row);
            *dirty = true;
            return true;
        }
        false
    }

    pub fn delete_row(block: &mut Block, index: usize) -> bool {
        if let Block::Table { rows, dirty, .. } = block {
            if index < rows.len() && rows.len() > 1 {
                rows.remove(index);
                *dirty = true;
                return true;
            }
        }
        false
    }

    pub fn insert_column(block: &mut Block, index: usize) -> bool {
        if let Block::Table { rows, dirty, .. } = block {
            for row in rows.iter_mut() {
                let idx = index.min(row.len());
                row.insert(idx, Cell::with_text(""));
            }
            *dirty = true;
            return true;
        }
        false
    }

    pub fn delete_column(block: &mut Block, index: usize) -> bool {
        if let Block::Table { rows, dirty, .. } = block {
            if rows.first().map_or(true, |r| r.len() <= 1) {
                return false;
            }
            for row in rows.iter_mut() {
                if index < row.len() {
                    row.remove(index);
                }
            }
            *dirty = true;
            return true;
        }
        false
    }

    pub fn dimensions(block: &Block) -> Option<(usize, usize)> {
        match block {
            Block::Table { rows, .. } => Some((rows.len(), rows.first().map_or(0, Vec::len))),
            _ => None,
        }
    }
}
