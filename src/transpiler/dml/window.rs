//! Window Function SQL generation.

use crate::ast::{FrameType, OverClause};
use crate::error::UnsupportedFeatureError;
use crate::fmt::frame_bound;
use crate::transpiler::writer::SqlWriter;

/// Generate ` OVER (...)`, turning frame sentinels back into UNBOUNDED and
/// CURRENT ROW.
pub(crate) fn build_over(w: &mut SqlWriter, over: &OverClause) -> Result<String, UnsupportedFeatureError> {
    w.generator.check_frame(over)?;

    let mut parts = Vec::new();
    if !over.partition_by.is_empty() {
        parts.push(format!("PARTITION BY {}", w.expr_list(&over.partition_by)?));
    }
    if !over.order_by.is_empty() {
        parts.push(format!("ORDER BY {}", w.order_items(&over.order_by)?));
    }
    if let Some(start) = &over.start {
        let frame = match over.frame_type {
            FrameType::Rows => "ROWS",
            FrameType::Range => "RANGE",
        };
        parts.push(match &over.end {
            Some(end) => format!(
                "{} BETWEEN {} AND {}",
                frame,
                frame_bound(start),
                frame_bound(end)
            ),
            None => format!("{} {}", frame, frame_bound(start)),
        });
    }
    Ok(format!(" OVER ({})", parts.join(" ")))
}
