#[macro_use]
extern crate afl;
use mecholm::{CryptoLibrary, Olm, base64_encode};

fn main() {
    let olm = Olm::new();
    let mut account = olm.account();
    account.create().expect("Setup failed");

    fuzz!(|data: &[u8]| {
        let body = base64_encode(data);

        let _ = olm.session().create_inbound(&account, &body);
        let _ = olm.inbound_group_session().create(&body);
        let _ = olm.inbound_group_session().import_session(&body);
    });
}
