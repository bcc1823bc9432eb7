//! Order file reader and the task generator process.
//!
//! # Order format
//!
//! One order per line, no header:
//!
//! ```csv
//! entering_time,order_number,priority,ax,ay[,bx,by]
//! 0,1,1,10,20,20,40
//! 12.5,2,3,4,4
//! ```
//!
//! `(ax, ay)` is the pickup and `(bx, by)` the optional dropoff, both in
//! floor metres and snapped to the nearest graph node.  Fields after `by`
//! are ignored.  Lines are taken in file order; the generator sleeps for the
//! difference between consecutive entering times.

use std::collections::HashSet;
use std::io::Read;
use std::str::FromStr;

use agv_core::{OrderNumber, Point};
use agv_kernel::SimHandle;
use agv_spatial::PathPlanner;
use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::{FleetError, FleetResult, KnowledgeBase, Rejection, Task};

/// Read raw order lines.  Fields are parsed later, one line at a time, by
/// the generator, so a malformed line only stops the generator when it is
/// reached.
pub fn read_order_records<R: Read>(reader: R) -> FleetResult<Vec<StringRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);
    let mut records = Vec::new();
    for result in csv_reader.records() {
        records.push(result?);
    }
    Ok(records)
}

// ── OrderRecord ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct OrderRecord {
    /// Simulated seconds since the run started.
    pub entering_time: f64,
    pub order_number:  OrderNumber,
    pub priority:      u32,
    pub pickup:        Point,
    pub dropoff:       Option<Point>,
}

impl OrderRecord {
    /// Parse one line.  `line` is 1-based and only used in errors.
    pub fn parse(record: &StringRecord, line: usize) -> FleetResult<Self> {
        if record.len() != 5 && record.len() < 7 {
            return Err(FleetError::MalformedOrder {
                line,
                message: format!("expected 5 or 7 fields, found {}", record.len()),
            });
        }
        let fields = Fields { record, line };
        let dropoff = if record.len() >= 7 {
            Some(Point::new(fields.coordinate(5, "bx")?, fields.coordinate(6, "by")?))
        } else {
            None
        };
        Ok(Self {
            entering_time: fields.coordinate(0, "entering_time")?,
            order_number:  OrderNumber(fields.parse(1, "order_number")?),
            priority:      fields.parse(2, "priority")?,
            pickup:        Point::new(fields.coordinate(3, "ax")?, fields.coordinate(4, "ay")?),
            dropoff,
        })
    }
}

/// Field access with line-tagged errors.
struct Fields<'r> {
    record: &'r StringRecord,
    line:   usize,
}

impl Fields<'_> {
    fn parse<T: FromStr>(&self, i: usize, name: &str) -> FleetResult<T> {
        let raw = self.record.get(i).unwrap_or_default();
        raw.parse().map_err(|_| FleetError::MalformedOrder {
            line:    self.line,
            message: format!("{name}: cannot parse {raw:?}"),
        })
    }

    fn coordinate(&self, i: usize, name: &str) -> FleetResult<f64> {
        let v: f64 = self.parse(i, name)?;
        if v.is_finite() {
            Ok(v)
        } else {
            Err(FleetError::MalformedOrder { line: self.line, message: format!("{name} is not finite") })
        }
    }
}

// ── TaskGenerator ─────────────────────────────────────────────────────────────

/// Spawns orders into the global queue at their entering times, then waits
/// for the fleet to drain.  Its termination ends the run.
pub struct TaskGenerator {
    handle:             SimHandle,
    kb:                 KnowledgeBase,
    planner:            PathPlanner,
    records:            Vec<StringRecord>,
    end_check_interval: f64,
}

impl TaskGenerator {
    pub fn new(
        handle: SimHandle,
        kb: KnowledgeBase,
        planner: PathPlanner,
        records: Vec<StringRecord>,
        end_check_interval: f64,
    ) -> Self {
        Self { handle, kb, planner, records, end_check_interval }
    }

    pub async fn run(self) -> FleetResult<()> {
        info!(orders = self.records.len(), "task generator started");
        let mut seen = HashSet::new();
        let mut last = 0.0;
        for (i, raw) in self.records.iter().enumerate() {
            let order = OrderRecord::parse(raw, i + 1)?;
            let wait = order.entering_time - last;
            if wait > 0.0 {
                self.handle.timeout(wait).await;
                last = order.entering_time;
            }
            self.spawn(order, &mut seen)?;
        }

        debug!("order file exhausted; waiting for the fleet to drain");
        while !self.kb.is_drained() {
            self.handle.timeout(self.end_check_interval).await;
        }
        info!(time = %self.handle.now(), "all orders served");
        Ok(())
    }

    fn spawn(&self, order: OrderRecord, seen: &mut HashSet<OrderNumber>) -> FleetResult<()> {
        let number = order.order_number;
        let pickup = self.planner.locate(order.pickup)?;
        let dropoff = order.dropoff.map(|p| self.planner.locate(p)).transpose()?;

        let reason = if number == OrderNumber::CHARGING {
            Some("order number 0 is reserved for charging")
        } else if !seen.insert(number) {
            Some("duplicate order number")
        } else if dropoff == Some(pickup) {
            Some("pickup and dropoff resolve to the same node")
        } else {
            None
        };
        if let Some(reason) = reason {
            warn!(order = %number, reason, "order dropped");
            self.kb.rejections.put(Rejection {
                order_number: number,
                reason:       reason.to_string(),
                time:         self.handle.now(),
            });
            return Ok(());
        }

        let task = Task::transport(number, pickup, dropoff, order.priority);
        info!(%task, time = %self.handle.now(), "task spawned");
        self.kb.global_tasks.put(task);
        Ok(())
    }
}
