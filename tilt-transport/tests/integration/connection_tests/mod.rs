mod test_handshake_failures;
mod test_offer_collision;
mod test_peer_leaves;
