use crate::error::Result;

use super::finger::FingerTable;
use super::service::DhtNodeService;
use super::state::NodeSnapshot;

const RING_SEPARATOR: &str = " ---> ";

fn id_list(ids: &[u64]) -> String {
    let ids: Vec<String> = ids.iter().map(u64::to_string).collect();
    format!("[{}]", ids.join(", "))
}

/// One line per member in id order, joined into a single arrow chain.
pub fn render_ring(members: &[NodeSnapshot]) -> String {
    let mut members: Vec<&NodeSnapshot> = members.iter().collect();
    members.sort_by_key(|member| member.node.id);
    members
        .iter()
        .map(|member| {
            format!(
                "{} ({}) - files: {} - local files: {}",
                member.node.id,
                member.node.addr,
                id_list(&member.files),
                id_list(&member.local_files)
            )
        })
        .collect::<Vec<_>>()
        .join(RING_SEPARATOR)
}

pub fn render_finger_table(table: &FingerTable) -> String {
    let header = ["Entry", "Start", "Interval", "Successor"].map(String::from);
    let rows: Vec<[String; 4]> = table
        .entries()
        .iter()
        .map(|entry| {
            [
                entry.index.to_string(),
                entry.start.to_string(),
                format!("[{}, {})", entry.start, entry.end),
                entry
                    .successor
                    .as_ref()
                    .map(|node| node.id.to_string())
                    .unwrap_or_else(|| "-".to_owned()),
            ]
        })
        .collect();

    let mut widths = header.clone().map(|cell| cell.len());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let border = widths
        .iter()
        .map(|width| "-".repeat(width + 2))
        .collect::<Vec<_>>()
        .join("+");
    let border = format!("+{}+", border);
    let line = |cells: &[String; 4]| {
        let cells: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!(" {:^width$} ", cell, width = width))
            .collect();
        format!("|{}|", cells.join("|"))
    };

    let mut out = vec![border.clone(), line(&header), border.clone()];
    out.extend(rows.iter().map(line));
    out.push(border);
    out.join("\n")
}

impl DhtNodeService {
    pub async fn ring_view(&self) -> Result<String> {
        let mut snapshots = Vec::new();
        for member in self.collect_members().await {
            snapshots.push(self.state_of(&member).await?);
        }
        Ok(render_ring(&snapshots))
    }

    pub async fn finger_table_view(&self) -> String {
        let state = self.state.lock().await;
        render_finger_table(&state.fingers)
    }
}
