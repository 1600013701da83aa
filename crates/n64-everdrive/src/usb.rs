//! USB packet protocol: one 16-byte packet per transaction.
//!
//! Two independent state machines, one per direction, each bounded by the
//! same poll ceiling. Neither blocks indefinitely: a stalled or unplugged
//! device surfaces as a `false` return with the lock released and the
//! packet slot untouched.

use cart_core::PiBus;

use crate::cart::Everdrive;
use crate::regs::{
    PACKET_LEN, PACKET_OFFSET, REG_USB_CFG, USB_CMD_RD, USB_CMD_RD_NOP, USB_CMD_WR, USB_CMD_WR_NOP,
    USB_DATA_BASE, USB_STA_ACT, USB_STA_PWR, USB_STA_RXF, USB_STA_TXE, USB_TIMEOUT_POLLS,
};

impl<B: PiBus> Everdrive<B> {
    /// Receive one 16-byte packet from the host, if one is waiting.
    ///
    /// Returns `false` without blocking when the link is unpowered, a
    /// transfer is already in flight, no data is available, or the device
    /// stalls past the poll ceiling. The buffer is only written on success.
    pub fn try_read_packet(&mut self, buf: &mut [u8; PACKET_LEN]) -> bool {
        self.lock();
        let status = self.reg_read(REG_USB_CFG);
        if status & USB_STA_PWR == 0
            || status & USB_STA_ACT != 0
            || status & USB_STA_RXF != 0
        {
            self.unlock();
            return false;
        }

        self.reg_write(REG_USB_CFG, USB_CMD_RD | PACKET_OFFSET);
        if !self.wait_usb_idle() {
            self.unlock();
            return false;
        }
        // Latch final state without starting another transfer
        self.reg_write(REG_USB_CFG, USB_CMD_RD_NOP | PACKET_OFFSET);
        self.pio_read(USB_DATA_BASE + PACKET_OFFSET, buf);
        self.unlock();
        true
    }

    /// Send one 16-byte packet to the host, if there is room.
    ///
    /// Mirror of [`try_read_packet`](Everdrive::try_read_packet): the data
    /// is staged into the device window before the transfer is started.
    pub fn try_write_packet(&mut self, buf: &[u8; PACKET_LEN]) -> bool {
        self.lock();
        let status = self.reg_read(REG_USB_CFG);
        if status & USB_STA_PWR == 0
            || status & USB_STA_ACT != 0
            || status & USB_STA_TXE != 0
        {
            self.unlock();
            return false;
        }

        self.reg_write(REG_USB_CFG, USB_CMD_WR_NOP | PACKET_OFFSET);
        self.pio_write(USB_DATA_BASE + PACKET_OFFSET, buf);
        self.reg_write(REG_USB_CFG, USB_CMD_WR | PACKET_OFFSET);
        let done = self.wait_usb_idle();
        self.unlock();
        done
    }

    /// Poll the busy/active bit until it clears or the ceiling is hit.
    fn wait_usb_idle(&mut self) -> bool {
        for _ in 0..USB_TIMEOUT_POLLS {
            if self.reg_read(REG_USB_CFG) & USB_STA_ACT == 0 {
                return true;
            }
        }
        false
    }
}
