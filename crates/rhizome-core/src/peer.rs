//! Peer addressing — HTTP/1.0 over TCP/IPv4 is the only transport this
//! subsystem speaks directly (see spec §1: "HTTP/IPv4 only is specified
//! here"). The MDP overlay transport is a separate collaborator.

use std::net::SocketAddrV4;

/// An IPv4 address and port identifying a peer serving Rhizome HTTP.
pub type Peer = SocketAddrV4;
