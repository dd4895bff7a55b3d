use log::*;
use netconf_core::datastore::Datastore;
use netconf_core::rpc::RpcRequest;
use netconf_core::schema::TestSchemaContext;
use netconf_core::session::Session;
use netconf_core::timeout::Timeout;
use netconf_core::transport::ssh::SSHTransport;
use std::sync::{Arc, Mutex};

fn main() {
    env_logger::init();
    let mut args = std::env::args();
    args.next();
    let addr = args.next().unwrap();

    info!("connecting to {addr}");
    let transport = SSHTransport::connect(&addr, "admin", "admin").unwrap();

    let schema = Arc::new(Mutex::new(TestSchemaContext::new()));
    let session = Session::new(transport, schema).unwrap();
    info!(
        "session {} established, {} peer capabilities",
        session.id(),
        session.capabilities().len()
    );

    let rpc = RpcRequest::GetConfig {
        source: Datastore::Running,
        filter: None,
        wd_mode: None,
    };
    let msg_id = session.send_rpc(&rpc, Timeout::Millis(10_000)).unwrap();
    let reply = session.recv_reply(&rpc, msg_id, Timeout::Millis(10_000)).unwrap();
    info!("running config reply: {reply:?}");

    session.close().unwrap();
}
