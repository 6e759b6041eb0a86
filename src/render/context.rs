//! GPU context management
//!
//! Headless EGL + OpenGL ES setup for the render thread. All drawing goes
//! to an FBO, so the surface is only a small pbuffer (or none at all when
//! the driver allows surfaceless contexts).

use anyhow::{anyhow, Context, Result};
use glow::HasContext;
use khronos_egl as egl;
use log::{info, warn};
use std::ffi::c_void;

const TAG: &str = "lockbridge::gpu";

// EGL_PLATFORM_SURFACELESS_MESA (EGL extension)
const EGL_PLATFORM_SURFACELESS_MESA: egl::Enum = 0x31DD;

/// EGL instance type (dynamic loading)
type EglInstance = egl::Instance<egl::Dynamic<libloading::Library, egl::EGL1_5>>;

/// Headless EGL context bound to the creating thread
pub struct EglContext {
    instance: EglInstance,
    display: egl::Display,
    context: egl::Context,
    surface: Option<egl::Surface>,
}

impl EglContext {
    /// Initialize EGL without a window system
    pub fn new_headless() -> Result<Self> {
        // Load EGL library
        let lib = unsafe {
            libloading::Library::new("libEGL.so.1")
                .or_else(|_| libloading::Library::new("libEGL.so"))
                .context("Failed to load EGL library")?
        };

        let instance: EglInstance = unsafe {
            egl::DynamicInstance::<egl::EGL1_5>::load_required_from(lib)
                .context("Failed to create EGL instance")?
        };

        // Prefer the surfaceless platform, fall back to the default display
        let display = unsafe {
            instance
                .get_platform_display(
                    EGL_PLATFORM_SURFACELESS_MESA,
                    egl::DEFAULT_DISPLAY,
                    &[egl::ATTRIB_NONE],
                )
                .ok()
                .or_else(|| instance.get_display(egl::DEFAULT_DISPLAY))
                .ok_or_else(|| anyhow!("Failed to get EGL display"))?
        };

        // Initialize EGL
        instance
            .initialize(display)
            .context("Failed to initialize EGL")?;

        // Get version info
        if let Ok(version_str) = instance.query_string(Some(display), egl::VERSION) {
            info!(target: TAG, "EGL version: {}", version_str.to_string_lossy());
        }

        // Bind OpenGL ES API
        instance
            .bind_api(egl::OPENGL_ES_API)
            .context("Failed to bind OpenGL ES API")?;

        // Choose config (try ES3, fallback to ES2)
        let config = Self::choose_config(&instance, display, egl::OPENGL_ES3_BIT)
            .or_else(|_| Self::choose_config(&instance, display, egl::OPENGL_ES2_BIT))
            .context("Failed to choose EGL config")?;

        // Create context (try ES3, fallback to ES2)
        let context_attribs_es3 = [egl::CONTEXT_CLIENT_VERSION, 3, egl::NONE];
        let context_attribs_es2 = [egl::CONTEXT_CLIENT_VERSION, 2, egl::NONE];
        let context = instance
            .create_context(display, config, None, &context_attribs_es3)
            .or_else(|_| instance.create_context(display, config, None, &context_attribs_es2))
            .context("Failed to create EGL context")?;

        // 1x1 pbuffer; rendering happens in the FBO
        let pbuffer_attribs = [egl::WIDTH, 1, egl::HEIGHT, 1, egl::NONE];
        let surface = match instance.create_pbuffer_surface(display, config, &pbuffer_attribs) {
            Ok(surface) => Some(surface),
            Err(e) => {
                warn!(target: TAG, "No pbuffer surface ({}), trying surfaceless context", e);
                None
            }
        };

        let this = Self {
            instance,
            display,
            context,
            surface,
        };
        this.make_current()?;

        info!(target: TAG, "EGL context created");
        Ok(this)
    }

    /// Make this context current on the calling thread
    pub fn make_current(&self) -> Result<()> {
        self.instance
            .make_current(self.display, self.surface, self.surface, Some(self.context))
            .context("Failed to make EGL context current")
    }

    /// Choose EGL config
    fn choose_config(
        instance: &EglInstance,
        display: egl::Display,
        renderable_type: egl::Int,
    ) -> Result<egl::Config> {
        let config_attribs = [
            egl::SURFACE_TYPE,
            egl::PBUFFER_BIT,
            egl::RED_SIZE,
            8,
            egl::GREEN_SIZE,
            8,
            egl::BLUE_SIZE,
            8,
            egl::ALPHA_SIZE,
            8,
            egl::RENDERABLE_TYPE,
            renderable_type,
            egl::NONE,
        ];

        instance
            .choose_first_config(display, &config_attribs)
            .context("choose_first_config failed")?
            .ok_or_else(|| anyhow!("No suitable EGL config found"))
    }

    /// Load GL function pointers
    pub fn get_proc_address(&self, name: &str) -> *const c_void {
        self.instance
            .get_proc_address(name)
            .map(|f| f as *const c_void)
            .unwrap_or(std::ptr::null())
    }

    /// glow context over this EGL context
    pub fn load_gl(&self) -> glow::Context {
        let gl = unsafe { glow::Context::from_loader_function(|name| self.get_proc_address(name)) };
        unsafe {
            info!(target: TAG, "OpenGL ES: {}", gl.get_parameter_string(glow::VERSION));
            info!(target: TAG, "Renderer: {}", gl.get_parameter_string(glow::RENDERER));
        }
        gl
    }
}

impl Drop for EglContext {
    fn drop(&mut self) {
        let _ = self.instance.make_current(self.display, None, None, None);
        if let Some(surface) = self.surface {
            let _ = self.instance.destroy_surface(self.display, surface);
        }
        let _ = self.instance.destroy_context(self.display, self.context);
        let _ = self.instance.terminate(self.display);
    }
}
