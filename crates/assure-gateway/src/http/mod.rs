pub mod chat;
pub mod health;
pub mod whatsapp;

/// Build the full greeting reply used by the "hi" reset shortcut, shared by
/// the `/chat` and WhatsApp webhook ingress points.
pub fn time_based_greeting() -> String {
    let now = assure_core::time::now_sgt();
    format!(
        "{}! I'm your insurance assistant. I can help you look up information, \
        get a recommendation, or compare plans for Travel, Maid, Car, or PersonalAccident \
        insurance. What can I help you with today?",
        assure_core::time::salutation(now)
    )
}
