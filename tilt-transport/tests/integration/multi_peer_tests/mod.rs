mod test_broadcast;
mod test_peer_failure_isolation;
mod test_signaling_loss;
