// Single logical actor: one cooperative thread drives input, timers, and checks.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    profile_gate::run().await;
}
