//! The auction relay.
//!
//! ```text
//! global_tasks ──get──▶ auction ──Announce──▶ every available robot's inbox
//!                                   bids ◀── one Bid per robot
//!                       auction ──Assign───▶ winner's inbox
//! ```
//!
//! One task is auctioned at a time.  The winner is the lowest finite bid,
//! ties to the lowest robot ID.  A task every robot bids infinity on cannot
//! be reached by anyone and is rejected.

use agv_core::RobotId;
use agv_kernel::SimHandle;
use tracing::{debug, info, warn};

use crate::{Bid, FleetResult, KnowledgeBase, Message, Rejection, Task};

pub struct Auctioneer {
    handle: SimHandle,
    kb:     KnowledgeBase,
    /// Seconds between checks while no robot is available.
    poll:   f64,
}

impl Auctioneer {
    pub fn new(handle: SimHandle, kb: KnowledgeBase, poll: f64) -> Self {
        Self { handle, kb, poll }
    }

    pub async fn run(self) -> FleetResult<()> {
        info!("auctioneer started");
        loop {
            let task = self.kb.global_tasks.get().await;
            self.kb.auction.put(task.clone());
            let bidders = self.wait_for_bidders().await;

            for &robot in &bidders {
                self.kb.inbox(robot).put(Message::Announce(task.clone()));
            }
            let mut bids = Vec::with_capacity(bidders.len());
            for _ in &bidders {
                let order = task.order_number;
                bids.push(self.kb.bids.get_filtered(move |b| b.order_number == order).await);
            }
            self.award(&task, &bids);
        }
    }

    /// Available robots in ID order, polling until there is at least one.
    async fn wait_for_bidders(&self) -> Vec<RobotId> {
        loop {
            let robots: Vec<RobotId> = self.kb.available_robots().iter().map(|r| r.id).collect();
            if !robots.is_empty() {
                return robots;
            }
            self.handle.timeout(self.poll).await;
        }
    }

    fn award(&self, task: &Task, bids: &[Bid]) {
        let Some(mut task) = self.kb.auction.remove(|t| t.same_as(task)) else {
            return;
        };
        match winning_bid(bids) {
            Some(bid) => {
                task.robot = Some(bid.robot);
                info!(%task, robot = %bid.robot, value = bid.value, bidders = bids.len(), "auction won");
                self.kb.inbox(bid.robot).put(Message::Assign(task, bid.robot));
            }
            None => {
                warn!(%task, "no robot can reach task; rejected");
                self.kb.rejections.put(Rejection {
                    order_number: task.order_number,
                    reason:       "unreachable by every robot".into(),
                    time:         self.handle.now(),
                });
            }
        }
    }
}

/// Lowest finite bid; ties go to the lowest robot ID.
pub fn winning_bid(bids: &[Bid]) -> Option<Bid> {
    let best = bids
        .iter()
        .filter(|b| b.value.is_finite())
        .min_by(|a, b| a.value.total_cmp(&b.value).then(a.robot.cmp(&b.robot)))
        .copied();
    debug!(bids = bids.len(), winner = ?best.map(|b| b.robot), "bids closed");
    best
}
