use embassy_time::Duration;

use crate::command::command_table;

/// Largest payload of one `%SOCKETDATA="SEND"`, hex doubles it on the wire.
pub const MAX_SEND_CHUNK: usize = 1200;

/// Largest payload requested per `%SOCKETDATA="RECEIVE"`, so that the hex
/// reply still fits a single message.
pub const MAX_RECEIVE_CHUNK: usize = 700;

command_table! {
    /// Commands of the Murata Type 1SC (ALT1250).
    ///
    /// The `%SOCKETCMD` operations share one name, replies only ever come
    /// from `ALLOCATE` and are matched to `SocketAllocate`.
    pub enum Type1scCmd {
        At => ("", Duration::from_millis(300)),
        Ate0 => ("E0", Duration::from_millis(300)),
        Cgmi => ("+CGMI", Duration::from_millis(300)),
        Cgmm => ("+CGMM", Duration::from_millis(300)),
        Cgmr => ("+CGMR", Duration::from_millis(300)),
        Cgsn => ("+CGSN", Duration::from_millis(300)),
        Cimi => ("+CIMI", Duration::from_millis(300)),
        Ccid => ("%CCID", Duration::from_millis(300)),
        Cmee => ("+CMEE", Duration::from_millis(300)),
        Cfun => ("+CFUN", Duration::from_secs(15)),
        Cpin => ("+CPIN", Duration::from_secs(5)),
        Csq => ("+CSQ", Duration::from_millis(300)),
        Cops => ("+COPS", Duration::from_secs(180)),
        Cereg => ("+CEREG", Duration::from_millis(300)),
        Cgatt => ("+CGATT", Duration::from_secs(140)),
        Cgdcont => ("+CGDCONT", Duration::from_millis(300)),
        Cgauth => ("+CGAUTH", Duration::from_millis(300)),
        Cgact => ("+CGACT", Duration::from_secs(150)),
        Cgpaddr => ("+CGPADDR", Duration::from_millis(300)),
        Cgev => ("+CGEV", Duration::from_millis(300)),
        Cpsms => ("+CPSMS", Duration::from_millis(300)),
        /// Boot indication, waited for as an event.
        Bootev => ("%BOOTEV", Duration::from_secs(10)),
        SocketAllocate => ("%SOCKETCMD", Duration::from_secs(1)),
        SocketActivate => ("%SOCKETCMD", Duration::from_secs(30)),
        SocketDeactivate => ("%SOCKETCMD", Duration::from_secs(10)),
        SocketDelete => ("%SOCKETCMD", Duration::from_secs(1)),
        Socketdata => ("%SOCKETDATA", Duration::from_secs(5)),
        Socketev => ("%SOCKETEV", Duration::from_millis(300)),
        Pingcmd => ("%PINGCMD", Duration::from_secs(5)),
        Reset => ("^RESET", Duration::from_secs(1)),
        Direct => ("", Duration::from_secs(1)),
    }
    direct = Direct;
}
