#[macro_use]
extern crate afl;
use mecholm::{CryptoLibrary, InboundGroupSession, MessageType, Olm, Session, base64_encode};

fn get_sessions(olm: &Olm) -> (Session, InboundGroupSession) {
    // The Victim
    let mut alice = olm.account();
    alice.create().expect("Setup failed");

    // The Attacker context
    let mut bob = olm.account();
    bob.create().expect("Setup failed");
    bob.generate_one_time_keys(1).expect("Setup failed");
    let one_time_key = *bob
        .one_time_keys()
        .expect("Setup failed")
        .values()
        .next()
        .expect("Setup failed");

    let mut session = olm.session();
    session
        .create_outbound(&alice, &bob.curve25519_key().expect("Setup failed"), &one_time_key)
        .expect("Setup failed");

    let mut outbound = olm.outbound_group_session();
    outbound.create().expect("Setup failed");
    let mut inbound = olm.inbound_group_session();
    inbound
        .create(&outbound.session_key().expect("Setup failed"))
        .expect("Setup failed");

    (session, inbound)
}

fn main() {
    let olm = Olm::new();
    let (mut session, mut group_session) = get_sessions(&olm);

    fuzz!(|data: &[u8]| {
        let body = base64_encode(data);
        let _ = session.decrypt(MessageType::Normal, &body);
        let _ = session.decrypt(MessageType::PreKey, &body);
        let _ = group_session.decrypt(&body);
    });
}
