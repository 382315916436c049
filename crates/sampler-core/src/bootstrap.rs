use crate::config::{PeripheralConfig, Variant, CCCD_UUID};
use crate::error::BootstrapError;
use crate::stack::{
    BleStack, CharacteristicHandle, DescriptorHandle, GattStatus, Permissions,
    Properties, ServiceHandle,
};

/// Progress of the GATT table build. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootstrapState {
    Unregistered,
    Registered,
    ServiceCreated,
    ServiceStarted,
    CharacteristicAdded,
    DescriptorAdded,
}

/// The bootstrap request or acknowledgement an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootstrapStep {
    Register,
    SetDeviceName,
    ConfigureAdvertising,
    StartAdvertising,
    CreateService,
    StartService,
    AddCharacteristic,
    SetReadValue,
    AddDescriptor,
}

/// Attribute handles recorded as the stack creates them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GattHandles {
    pub service: Option<ServiceHandle>,
    pub characteristic: Option<CharacteristicHandle>,
    pub descriptor: Option<DescriptorHandle>,
}

/// Builds the single service, characteristic and CCCD in the order the
/// stack acknowledges them.
///
/// Each `on_*` method handles one acknowledgement. An acknowledgement that
/// arrives before the state it depends on is rejected with
/// [`BootstrapError::OutOfOrder`] and changes nothing. A failure status or a
/// refused request halts the sequencer for good; every later
/// acknowledgement then returns [`BootstrapError::Halted`].
pub struct BootstrapSequencer {
    config: PeripheralConfig,
    state: BootstrapState,
    handles: GattHandles,
    halted: bool,
}

impl BootstrapSequencer {
    pub const fn new(config: PeripheralConfig) -> Self {
        Self {
            config,
            state: BootstrapState::Unregistered,
            handles: GattHandles {
                service: None,
                characteristic: None,
                descriptor: None,
            },
            halted: false,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    pub fn handles(&self) -> &GattHandles {
        &self.handles
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_complete(&self) -> bool {
        match self.config.variant {
            Variant::Notify => self.state == BootstrapState::DescriptorAdded,
            Variant::Read => self.state == BootstrapState::CharacteristicAdded,
        }
    }

    /// Register the application with the stack.
    pub fn start<S: BleStack>(
        &mut self,
        stack: &S,
    ) -> Result<(), BootstrapError<S::Error>> {
        self.expect(BootstrapStep::Register, BootstrapState::Unregistered)?;
        self.request(
            BootstrapStep::Register,
            stack.register_application(self.config.app_id),
        )
    }

    /// Application registered: name the device, configure advertising and
    /// create the service.
    pub fn on_registered<S: BleStack>(
        &mut self,
        stack: &S,
        app_id: u16,
        status: GattStatus,
    ) -> Result<(), BootstrapError<S::Error>> {
        self.expect(BootstrapStep::Register, BootstrapState::Unregistered)?;
        if app_id != self.config.app_id {
            warn!("registration for foreign application {}", app_id);
            return Ok(());
        }
        self.check(BootstrapStep::Register, status)?;
        self.state = BootstrapState::Registered;
        info!("application {} registered", app_id);

        let name = self.config.device_name;
        self.request(BootstrapStep::SetDeviceName, stack.set_device_name(name))?;
        let payload = self.config.advertising_data.encode(name);
        self.request(
            BootstrapStep::ConfigureAdvertising,
            stack.configure_advertising(&payload),
        )?;
        self.request(
            BootstrapStep::CreateService,
            stack.create_service(
                self.config.service_uuid,
                true,
                self.config.num_handles,
            ),
        )
    }

    /// Advertising payload configured: start advertising. May arrive
    /// before or between the service acknowledgements.
    pub fn on_adv_data_set<S: BleStack>(
        &mut self,
        stack: &S,
        status: GattStatus,
    ) -> Result<(), BootstrapError<S::Error>> {
        if self.halted {
            return Err(BootstrapError::Halted);
        }
        if self.state == BootstrapState::Unregistered {
            return Err(BootstrapError::OutOfOrder {
                step: BootstrapStep::ConfigureAdvertising,
                state: self.state,
            });
        }
        self.check(BootstrapStep::ConfigureAdvertising, status)?;
        debug!("advertising data set");
        self.request(
            BootstrapStep::StartAdvertising,
            stack.start_advertising(&self.config.advertising),
        )
    }

    /// Service created: start it and add the stream characteristic.
    pub fn on_service_created<S: BleStack>(
        &mut self,
        stack: &S,
        handle: u16,
        status: GattStatus,
    ) -> Result<(), BootstrapError<S::Error>> {
        self.expect(BootstrapStep::CreateService, BootstrapState::Registered)?;
        self.check(BootstrapStep::CreateService, status)?;
        let service = ServiceHandle(handle);
        self.handles.service = Some(service);
        self.state = BootstrapState::ServiceCreated;
        info!("service created with handle {}", handle);

        self.request(BootstrapStep::StartService, stack.start_service(service))?;
        self.state = BootstrapState::ServiceStarted;

        let properties = match self.config.variant {
            Variant::Notify => Properties::NOTIFY,
            Variant::Read => Properties::READ,
        };
        self.request(
            BootstrapStep::AddCharacteristic,
            stack.add_characteristic(
                service,
                self.config.characteristic_uuid,
                Permissions::READ,
                properties,
            ),
        )
    }

    /// Characteristic added: add the CCCD for the notify variant, or load
    /// the static value for the read variant.
    pub fn on_characteristic_added<S: BleStack>(
        &mut self,
        stack: &S,
        handle: u16,
        status: GattStatus,
    ) -> Result<(), BootstrapError<S::Error>> {
        self.expect(
            BootstrapStep::AddCharacteristic,
            BootstrapState::ServiceStarted,
        )?;
        let Some(service) = self.handles.service else {
            return Err(BootstrapError::OutOfOrder {
                step: BootstrapStep::AddCharacteristic,
                state: self.state,
            });
        };
        self.check(BootstrapStep::AddCharacteristic, status)?;
        self.handles.characteristic = Some(CharacteristicHandle(handle));
        self.state = BootstrapState::CharacteristicAdded;
        info!("characteristic added with handle {}", handle);

        match self.config.variant {
            Variant::Notify => self.request(
                BootstrapStep::AddDescriptor,
                stack.add_descriptor(
                    service,
                    CCCD_UUID,
                    Permissions::READ | Permissions::WRITE,
                ),
            ),
            Variant::Read => {
                self.request(
                    BootstrapStep::SetReadValue,
                    stack.set_attribute_value(handle, &[self.config.read_value]),
                )?;
                info!("GATT bootstrap complete");
                Ok(())
            }
        }
    }

    /// CCCD added: bootstrap of the notify variant is complete.
    pub fn on_descriptor_added<E>(
        &mut self,
        handle: u16,
        status: GattStatus,
    ) -> Result<(), BootstrapError<E>> {
        if self.config.variant == Variant::Read {
            if self.halted {
                return Err(BootstrapError::Halted);
            }
            // The read variant never asks for a descriptor.
            return Err(BootstrapError::OutOfOrder {
                step: BootstrapStep::AddDescriptor,
                state: self.state,
            });
        }
        self.expect(
            BootstrapStep::AddDescriptor,
            BootstrapState::CharacteristicAdded,
        )?;
        self.check(BootstrapStep::AddDescriptor, status)?;
        self.handles.descriptor = Some(DescriptorHandle(handle));
        self.state = BootstrapState::DescriptorAdded;
        info!("descriptor added with handle {}, GATT bootstrap complete", handle);
        Ok(())
    }

    fn expect<E>(
        &self,
        step: BootstrapStep,
        state: BootstrapState,
    ) -> Result<(), BootstrapError<E>> {
        if self.halted {
            return Err(BootstrapError::Halted);
        }
        if self.state != state {
            return Err(BootstrapError::OutOfOrder { step, state: self.state });
        }
        Ok(())
    }

    fn check<E>(
        &mut self,
        step: BootstrapStep,
        status: GattStatus,
    ) -> Result<(), BootstrapError<E>> {
        if status.is_success() {
            return Ok(());
        }
        self.halted = true;
        Err(BootstrapError::Rejected { step, status })
    }

    fn request<E>(
        &mut self,
        step: BootstrapStep,
        result: Result<(), E>,
    ) -> Result<(), BootstrapError<E>> {
        result.map_err(|error| {
            self.halted = true;
            BootstrapError::Stack { step, error }
        })
    }
}
