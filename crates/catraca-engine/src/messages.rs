//! Display messages for admission decisions
//!
//! Shown on the controller display (40 columns). Messages are Portuguese
//! (Brazilian) apart from the controller's own default deny text.
//!
//! # Usage
//!
//! ```
//! use catraca_engine::DisplayMessages;
//!
//! assert_eq!(DisplayMessages::ACCESS_GRANTED, "ACESSO LIBERADO");
//! ```

/// Display messages for admission decisions
pub struct DisplayMessages;

impl DisplayMessages {
    /// Sent with allow-entry and allow-exit
    pub const ACCESS_GRANTED: &'static str = "ACESSO LIBERADO";

    /// Deny without a more specific reason (unknown credential, no class today)
    pub const ACCESS_DENIED: &'static str = "ACCESS DENIED";

    /// The import lock is held
    pub const SYSTEM_UPDATING: &'static str = "SISTEMA ATUALIZANDO";

    /// A passage was already recorded within twice the tolerance
    pub const ONE_ACCESS_PER_CLASS: &'static str = "APENAS UM ACESSO POR AULA";

    /// A class window opens later today
    pub const TOO_EARLY: &'static str = "VOLTE NO HORÁRIO DA AULA";

    /// Every class window of the day has closed
    pub const LATE: &'static str = "ATRASADO(A)";

    /// A repository call failed while deciding
    pub const TRY_AGAIN: &'static str = "ERRO, TENTE NOVAMENTE";
}
