use embassy_time::Duration;

use crate::command::command_table;

/// Highest connection id plus one (`<connectID>` 0-11).
pub const MAX_CONNECTIONS: u8 = 12;

command_table! {
    /// Commands of the Quectel BG96.
    ///
    /// Timeouts are the maximum response times of the AT manual, rounded up.
    pub enum Bg96Cmd {
        At => ("", Duration::from_millis(300)),
        Ate0 => ("E0", Duration::from_millis(300)),
        Ato => ("O", Duration::from_secs(1)),
        Cgmi => ("+CGMI", Duration::from_millis(300)),
        Cgmm => ("+CGMM", Duration::from_millis(300)),
        Cgmr => ("+CGMR", Duration::from_millis(300)),
        Cgsn => ("+CGSN", Duration::from_millis(300)),
        Cimi => ("+CIMI", Duration::from_millis(300)),
        Qccid => ("+QCCID", Duration::from_millis(300)),
        Ifc => ("+IFC", Duration::from_millis(300)),
        Cmee => ("+CMEE", Duration::from_millis(300)),
        Cfun => ("+CFUN", Duration::from_secs(15)),
        Cpin => ("+CPIN", Duration::from_secs(5)),
        Csq => ("+CSQ", Duration::from_millis(300)),
        Cops => ("+COPS", Duration::from_secs(180)),
        Creg => ("+CREG", Duration::from_millis(300)),
        Cgreg => ("+CGREG", Duration::from_millis(300)),
        Cereg => ("+CEREG", Duration::from_millis(300)),
        Cgatt => ("+CGATT", Duration::from_secs(140)),
        Qicsgp => ("+QICSGP", Duration::from_millis(300)),
        Qiact => ("+QIACT", Duration::from_secs(150)),
        Qideact => ("+QIDEACT", Duration::from_secs(40)),
        Cgpaddr => ("+CGPADDR", Duration::from_millis(300)),
        Qiopen => ("+QIOPEN", Duration::from_secs(1)),
        Qiclose => ("+QICLOSE", Duration::from_secs(10)),
        Qisend => ("+QISEND", Duration::from_secs(5)),
        Qird => ("+QIRD", Duration::from_secs(1)),
        Qiurc => ("+QIURC", Duration::from_millis(300)),
        Qping => ("+QPING", Duration::from_secs(5)),
        Qurccfg => ("+QURCCFG", Duration::from_millis(300)),
        Cpsms => ("+CPSMS", Duration::from_millis(300)),
        Qsclk => ("+QSCLK", Duration::from_millis(300)),
        Qpowd => ("+QPOWD", Duration::from_millis(300)),
        Cgev => ("+CGEV", Duration::from_millis(300)),
        Qind => ("+QIND", Duration::from_millis(300)),
        /// Boot indication, waited for as an event.
        Rdy => ("RDY", Duration::from_secs(10)),
        /// Power down indication, waited for as an event.
        PoweredDown => ("POWERED DOWN", Duration::from_secs(60)),
        /// `+++`, only valid in data mode.
        Escape => ("", Duration::from_secs(2)),
        /// Socket payload after the `> ` prompt.
        SendRaw => ("", Duration::from_secs(5)),
        Direct => ("", Duration::from_secs(1)),
    }
    direct = Direct;
}
