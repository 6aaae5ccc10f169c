//! Half-duplex UART capability required by the ISR pump (§4.1).

bitflags::bitflags! {
    /// Interrupt sources the pump enables/disables/polls over the lifetime
    /// of a single send or receive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UartInterrupt: u8 {
        const RX_FIFO_FULL = 1 << 0;
        const RX_TIMEOUT    = 1 << 1;
        const BRK_DETECTED  = 1 << 2;
        const TX_FIFO_EMPTY = 1 << 3;
        const TX_DONE       = 1 << 4;
        const FRAME_ERR     = 1 << 5;
    }
}

/// A 250 kbaud, 8N2, half-duplex UART with a software RTS direction line and
/// a TXD-inversion capability used to generate the DMX BREAK.
///
/// Implementations must not allocate or block in any method; every method
/// here is called from both task and interrupt context.
pub trait Uart {
    /// Programs the baud rate. The driver always requests 250_000.
    fn set_baud_rate(&mut self, baud: u32);

    /// Selects 8 data bits, no parity, 2 stop bits.
    fn set_8n2(&mut self);

    /// Drives the RTS line: `true` = receive (line driver listening),
    /// `false` = transmit.
    fn set_rts(&mut self, receive: bool);

    /// Inverts the idle-high TXD line. Used to hold the line low for BREAK.
    fn invert_tx(&mut self, inverted: bool);

    /// Number of bytes currently queued in the RX FIFO.
    fn rx_fifo_len(&self) -> usize;

    /// Drains up to `dest.len()` bytes from the RX FIFO, returning the count read.
    fn read_rx_fifo(&mut self, dest: &mut [u8]) -> usize;

    /// Clears any buffered RX FIFO contents.
    fn reset_rx_fifo(&mut self);

    /// Number of bytes currently queued in the TX FIFO.
    fn tx_fifo_len(&self) -> usize;

    /// Enqueues up to `src.len()` bytes into the TX FIFO, returning the count written.
    fn write_tx_fifo(&mut self, src: &[u8]) -> usize;

    /// Clears any buffered TX FIFO contents.
    fn reset_tx_fifo(&mut self);

    /// Enables the given interrupt sources (additive).
    fn enable_interrupts(&mut self, mask: UartInterrupt);

    /// Disables the given interrupt sources.
    fn disable_interrupts(&mut self, mask: UartInterrupt);

    /// Returns the sources that are currently pending, without clearing them.
    fn interrupt_status(&self) -> UartInterrupt;

    /// Clears the given pending sources.
    fn clear_interrupts(&mut self, mask: UartInterrupt);
}
