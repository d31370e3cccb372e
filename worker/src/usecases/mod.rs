pub mod auto_accept_sweep;
pub mod dispute_escalation_sweep;
