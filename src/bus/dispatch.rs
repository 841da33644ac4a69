//! Service dispatcher.
//!
//! Owns every service's register store and handler, the pipe table, the
//! event queue and the announce scheduler.  The transport feeds it
//! `(service_id, Packet)` pairs and writes back whatever report comes out;
//! the caller's loop drives time through [`Dispatcher::tick`].
//!
//! Every failure becomes an error report.  Nothing on the dispatch path
//! panics or stops the loop.

use log::{debug, info, warn};

use super::announce::{AnnounceDue, AnnounceScheduler};
use super::codec::{self, CommandTable, GenericOp, Operation};
use super::packet::{Packet, Report};
use super::pipe::PipeTable;
use super::stream::StreamManager;
use crate::config::BusConfig;
use crate::consts::{CONTROL_SERVICE_CLASS, base};
use crate::error::Error;
use crate::events::{BusEvent, EventQueue};
use crate::ports::AnnounceDelegate;
use crate::registers::RegisterStore;
use crate::services::{ControlService, ServiceContext, ServiceDescriptor, ServiceHandler, catalog};

struct ServiceEntry {
    descriptor: &'static ServiceDescriptor,
    commands: CommandTable,
    registers: RegisterStore,
    handler: Box<dyn ServiceHandler>,
    stream: Option<StreamManager>,
}

pub struct Dispatcher {
    config: BusConfig,
    services: Vec<ServiceEntry>,
    /// Service class per id, kept beside `services` so handlers can see
    /// the whole list while one entry is borrowed.
    classes: Vec<u32>,
    pipes: PipeTable,
    events: EventQueue,
    announce: AnnounceScheduler,
}

type Reply = Result<Option<Vec<u8>>, Error>;

impl Dispatcher {
    /// Validate `config` and install the control service as id 0.
    pub fn new(config: BusConfig, control: ControlService) -> Result<Self, Error> {
        config.validate()?;
        let mut bus = Self {
            pipes: PipeTable::new(config.max_pipes),
            events: EventQueue::new(),
            announce: AnnounceScheduler::new(config.announce_interval_ms),
            services: Vec::new(),
            classes: Vec::new(),
            config,
        };
        bus.add_service(CONTROL_SERVICE_CLASS, &catalog::CONTROL, Box::new(control))?;
        Ok(bus)
    }

    /// Append a service.  Its handler's `init` runs before constants are
    /// sealed.  Returns the new service id.
    pub fn add_service(
        &mut self,
        class: u32,
        descriptor: &'static ServiceDescriptor,
        handler: Box<dyn ServiceHandler>,
    ) -> Result<u8, Error> {
        let id = u8::try_from(self.services.len()).map_err(|_| Error::Config("too many services"))?;
        let registers = RegisterStore::new(descriptor.registers)?;
        let commands = CommandTable::new(descriptor.commands)?;

        self.classes.push(class);
        self.services.push(ServiceEntry {
            descriptor,
            commands,
            registers,
            handler,
            stream: None,
        });

        if let Some((Err(e), _)) = self.call(id, |h, ctx| h.init(ctx)) {
            warn!("BUS[{}]: {} init failed: {}", id, descriptor.name, e);
            self.services.pop();
            self.classes.pop();
            return Err(e);
        }

        let attached = self.announce.is_attached();
        let (min, default) = (
            self.config.min_streaming_interval_ms,
            self.config.default_streaming_interval_ms,
        );
        if let Some(entry) = self.services.last_mut() {
            entry.registers.seal();
            if StreamManager::supported(&entry.registers) {
                let mut stream = StreamManager::new(min, default);
                stream.sync(&entry.registers);
                if !attached {
                    stream.pause();
                }
                entry.stream = Some(stream);
            }
        }
        self.announce.add_service(id);
        info!("BUS[{}]: added {} (class 0x{:08x})", id, descriptor.name, class);
        Ok(id)
    }

    /// Serve one packet.  `None` when nothing goes back on the wire: an
    /// unknown service, or a command without a result and without an ACK
    /// request.
    pub fn dispatch(&mut self, service_id: u8, packet: &Packet<'_>) -> Option<Report> {
        let Some(entry) = self.services.get(usize::from(service_id)) else {
            warn!("BUS[{}]: no such service, 0x{:x} dropped", service_id, packet.code);
            return None;
        };
        debug!(
            "BUS[{}]: 0x{:x} ({} bytes)",
            service_id,
            packet.code,
            packet.payload.len()
        );

        let decoded = codec::decode(packet.code, packet.payload, &entry.commands);
        let (reply, reset) = match decoded {
            Ok(op) => self.execute(service_id, op),
            Err(e) => (Err(e.into()), false),
        };

        let report = match reply {
            Ok(Some(payload)) => Some(Report::data(service_id, packet.code, payload)),
            Ok(None) if packet.ack_requested => Some(Report::ack(service_id, packet.code)),
            Ok(None) => None,
            Err(e) => {
                warn!("BUS[{}]: 0x{:x} rejected: {}", service_id, packet.code, e);
                Some(Report::error(service_id, packet.code, &e))
            }
        };
        if reset {
            self.reset();
        }
        report
    }

    fn execute(&mut self, id: u8, op: Operation<'_>) -> (Reply, bool) {
        let outcome = match op {
            Operation::Generic(GenericOp::Announce) => {
                self.announce.mark_announced(id);
                self.call(id, |h, ctx| Ok(Some(h.announce(ctx))))
            }
            Operation::Generic(GenericOp::Calibrate) => {
                self.call(id, |h, ctx| h.calibrate(ctx).map(|()| None))
            }
            Operation::Generic(GenericOp::Description) => {
                let name = self.services.get(usize::from(id)).map(|e| e.descriptor.name);
                self.call(id, |h, ctx| {
                    let text = h
                        .description(ctx)
                        .unwrap_or_else(|| name.unwrap_or_default().as_bytes().to_vec());
                    Ok(Some(text))
                })
            }
            Operation::Generic(GenericOp::GetRegister(addr)) => {
                let reply = self
                    .services
                    .get(usize::from(id))
                    .ok_or(Error::UnknownService(id))
                    .and_then(|e| Ok(Some(e.registers.read(addr)?.bytes.to_vec())));
                return (reply, false);
            }
            Operation::Generic(GenericOp::SetRegister { addr, value }) => {
                return self.set_register(id, addr, value);
            }
            Operation::ServiceSpecific { code, payload } => {
                self.call(id, |h, ctx| h.command(ctx, code, payload))
            }
        };
        outcome.unwrap_or((Err(Error::UnknownService(id)), false))
    }

    fn set_register(&mut self, id: u8, addr: u16, value: &[u8]) -> (Reply, bool) {
        let Some(entry) = self.services.get_mut(usize::from(id)) else {
            return (Err(Error::UnknownService(id)), false);
        };
        if let Err(e) = entry.registers.write(addr, value) {
            return (Err(e.into()), false);
        }
        debug!("BUS[{}]: register 0x{:x} set ({} bytes)", id, addr, value.len());

        let reset = self
            .call(id, |h, ctx| h.on_register_written(ctx, addr))
            .is_some_and(|((), reset)| reset);
        let attached = self.announce.is_attached();
        if let Some(entry) = self.services.get_mut(usize::from(id)) {
            if let Some(stream) = entry.stream.as_mut() {
                stream.sync(&entry.registers);
                if !attached {
                    stream.pause();
                }
            }
        }
        (Ok(None), reset)
    }

    /// Run `f` against one handler with a fresh context.  Returns the
    /// result and whether the handler asked for a device reset.
    fn call<R>(
        &mut self,
        id: u8,
        f: impl FnOnce(&mut dyn ServiceHandler, &mut ServiceContext<'_>) -> R,
    ) -> Option<(R, bool)> {
        let entry = self.services.get_mut(usize::from(id))?;
        let mut ctx = ServiceContext {
            service_id: id,
            classes: &self.classes,
            registers: &mut entry.registers,
            pipes: &mut self.pipes,
            events: &mut self.events,
            reset_requested: false,
        };
        let out = f(entry.handler.as_mut(), &mut ctx);
        Some((out, ctx.reset_requested))
    }

    // ── Time ──────────────────────────────────────────────────

    /// Advance time by `delta_ms`: announce scheduling, handler ticks and,
    /// while attached, register streaming.
    pub fn tick(&mut self, delta_ms: u32, delegate: &mut dyn AnnounceDelegate) {
        for due in self.announce.tick(delta_ms) {
            match due {
                AnnounceDue::SelfAnnounce => {
                    if let Some((payload, _)) = self.call(0, |h, ctx| h.announce(ctx)) {
                        delegate.on_self_announce(&Report::data(0, base::CMD_ANNOUNCE, payload));
                    }
                }
                AnnounceDue::QueryDue(id) => {
                    debug!("ANN: service {} due for query", id);
                    delegate.on_query_due(id);
                }
            }
        }

        let mut reset = false;
        for id in 0..self.services.len() {
            if let Some(((), r)) = self.call(id as u8, |h, ctx| h.tick(ctx, delta_ms)) {
                reset |= r;
            }
        }

        if self.announce.is_attached() {
            for (id, entry) in self.services.iter_mut().enumerate() {
                let Some(stream) = entry.stream.as_mut() else {
                    continue;
                };
                if !stream.tick(delta_ms) {
                    continue;
                }
                match entry.registers.read(base::REG_READING) {
                    Ok(v) => delegate.on_broadcast(&Report::data(
                        id as u8,
                        codec::get_register_code(base::REG_READING),
                        v.bytes.to_vec(),
                    )),
                    Err(e) => warn!("BUS[{}]: stream read failed: {}", id, e),
                }
            }
        }

        if reset {
            self.reset();
        }
    }

    /// Bus attach: start announcing and resume streams.
    pub fn attach(&mut self) {
        self.announce.attach();
        for stream in self.services.iter_mut().filter_map(|e| e.stream.as_mut()) {
            stream.resume();
        }
    }

    /// Bus detach: stop announcing and pause streams.
    pub fn detach(&mut self) {
        self.announce.detach();
        for stream in self.services.iter_mut().filter_map(|e| e.stream.as_mut()) {
            stream.pause();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.announce.is_attached()
    }

    /// Device reset.  Registers return to their defaults, pipes close,
    /// queued events are dropped and announce windows restart.  Handlers
    /// reset last, highest id first, so the control service (which resets
    /// the device itself) runs after everyone else.
    pub fn reset(&mut self) {
        info!("BUS: reset ({} services)", self.services.len());
        for entry in &mut self.services {
            entry.registers.reset_to_defaults();
        }
        self.pipes.close_all();
        self.events.clear();
        self.announce.restart();

        for id in (0..self.services.len()).rev() {
            self.call(id as u8, |h, ctx| h.reset(ctx));
        }

        let attached = self.announce.is_attached();
        for entry in &mut self.services {
            if let Some(stream) = entry.stream.as_mut() {
                stream.sync(&entry.registers);
                if !attached {
                    stream.pause();
                }
            }
        }
    }

    // ── Events ────────────────────────────────────────────────

    /// Queue an event on behalf of a service (e.g. from an interrupt
    /// adapter).  `Ok(false)` if the queue was full.
    pub fn emit_event(&mut self, service_id: u8, code: u16, payload: &[u8]) -> Result<bool, Error> {
        if usize::from(service_id) >= self.services.len() {
            return Err(Error::UnknownService(service_id));
        }
        let event = BusEvent::new(service_id, code, payload)?;
        Ok(self.events.push(event))
    }

    /// Hand every queued event to `sink` as a report, oldest first.
    pub fn drain_events(&mut self, mut sink: impl FnMut(Report)) {
        self.events.drain(|e| sink(Report::event(&e)));
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn service_class(&self, service_id: u8) -> Option<u32> {
        self.classes.get(usize::from(service_id)).copied()
    }

    pub fn service_name(&self, service_id: u8) -> Option<&'static str> {
        self.services
            .get(usize::from(service_id))
            .map(|e| e.descriptor.name)
    }

    pub fn registers(&self, service_id: u8) -> Option<&RegisterStore> {
        self.services
            .get(usize::from(service_id))
            .map(|e| &e.registers)
    }

    /// Device-side access, e.g. a sensor adapter refreshing `Reading`.
    pub fn registers_mut(&mut self, service_id: u8) -> Option<&mut RegisterStore> {
        self.services
            .get_mut(usize::from(service_id))
            .map(|e| &mut e.registers)
    }

    pub fn stream_state(&self, service_id: u8) -> Option<super::StreamState> {
        self.services
            .get(usize::from(service_id))
            .and_then(|e| e.stream.as_ref())
            .map(StreamManager::state)
    }

    pub fn pipes(&self) -> &PipeTable {
        &self.pipes
    }

    /// Host side of the pipes: the transport moves records through here.
    pub fn pipes_mut(&mut self) -> &mut PipeTable {
        &mut self.pipes
    }
}
